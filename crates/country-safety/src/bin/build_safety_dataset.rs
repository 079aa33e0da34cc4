//! Safety Dataset Builder
//!
//! Regenerates the country safety catalog from REST Countries, State
//! Department travel advisories and optional curated presets.
//!
//! Usage:
//!   build-safety-dataset --presets data/safety_presets.json \
//!                        --output data/country_safety.json

use anyhow::Result;
use clap::Parser;
use country_safety::dataset::{self, AdvisoryIndex, DatasetSummary, TRAVEL_ADVISORY_URL};
use country_safety::{RestCountriesClient, RestCountriesConfig};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "build-safety-dataset",
    about = "Build the country safety dataset from live sources"
)]
struct Args {
    /// Output JSON file
    #[arg(short, long, default_value = "data/country_safety.json")]
    output: PathBuf,

    /// Curated presets JSON (code -> partial record)
    #[arg(short, long)]
    presets: Option<PathBuf>,

    /// Also write build statistics next to the output
    #[arg(long)]
    summary: bool,

    /// REST Countries API root
    #[arg(long, default_value_t = RestCountriesConfig::default().base_url)]
    base_url: String,

    /// Travel advisory feed
    #[arg(long, default_value = TRAVEL_ADVISORY_URL)]
    advisory_url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Skip the advisory feed entirely
    #[arg(long)]
    no_advisories: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Country Safety Dataset Builder");
    info!("{}", "=".repeat(60));

    let countries_client = RestCountriesClient::new(RestCountriesConfig {
        base_url: args.base_url.clone(),
        timeout_sec: args.timeout_secs,
    })?;
    let countries = countries_client.fetch_all().await?;
    info!("Got {} countries from REST Countries", countries.len());

    let advisories = if args.no_advisories {
        AdvisoryIndex::default()
    } else {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.timeout_secs))
            .build()?;
        let records = dataset::fetch_travel_advisories(&http, &args.advisory_url)
            .await
            .unwrap_or_else(|e| {
                warn!("Continuing without advisories: {}", e);
                Vec::new()
            });
        dataset::build_advisory_index(&records, &countries)
    };

    let presets = match &args.presets {
        Some(path) => dataset::load_presets(path)?,
        None => HashMap::new(),
    };
    info!("Loaded {} presets", presets.len());

    let records = dataset::merge_country_safety(&countries, &advisories, &presets);
    let json = dataset::to_dataset_json(&records)?;

    info!("Writing dataset to {:?}", args.output);
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(writer, &json)?;

    let summary = DatasetSummary::new(&records, &advisories);
    if args.summary {
        let path = args.output.with_extension("summary.json");
        info!("Writing summary to {:?}", path);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &summary)?;
    }

    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Countries:       {}", summary.total_countries);
    info!("Core countries:  {}", summary.core_countries);
    info!("With advisory:   {}", summary.with_advisory);
    let mut distribution: Vec<_> = summary.risk_distribution.iter().collect();
    distribution.sort();
    for (risk, count) in distribution {
        info!("  {}: {}", risk, count);
    }

    Ok(())
}
