//! Country Brief CLI
//!
//! Resolves a country and prints its safety brief, optionally answering a
//! question about it.
//!
//! Usage:
//!   country-brief "Japan"
//!   country-brief france --ask "someone stole my wallet" --json

use anyhow::{bail, Result};
use clap::Parser;
use country_safety::{
    compose_guidance, CatalogHandle, CatalogSource, CountryBrief, CountryResolver, Guidance,
    ResolveError, RestCountriesClient, RestCountriesConfig,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "country-brief",
    about = "Show the safety brief for a country"
)]
struct Args {
    /// Country name to look up
    query: String,

    /// Safety dataset: file path or http(s) URL
    #[arg(short, long, default_value = "data/country_safety.json")]
    dataset: String,

    /// Question to answer for the resolved country
    #[arg(short, long)]
    ask: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// REST Countries API root
    #[arg(long, default_value_t = RestCountriesConfig::default().base_url)]
    base_url: String,

    /// Request timeout in seconds (REST Countries and dataset URL)
    #[arg(long, default_value_t = RestCountriesConfig::default().timeout_sec)]
    timeout_secs: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    code: &'a str,
    used_fallback: bool,
    brief: &'a CountryBrief,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<&'a Guidance>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let catalog =
        CatalogHandle::pending().with_fetch_timeout(Duration::from_secs(args.timeout_secs));
    let source = CatalogSource::parse(&args.dataset);
    if let Err(e) = catalog.load_from(&source).await {
        warn!("Continuing without safety dataset: {}", e);
    }

    let client = RestCountriesClient::new(RestCountriesConfig {
        base_url: args.base_url.clone(),
        timeout_sec: args.timeout_secs,
    })?;
    let resolver = CountryResolver::new(Arc::new(client), catalog);

    let resolved = match resolver.resolve(&args.query).await {
        Ok(resolved) => resolved,
        Err(ResolveError::EmptyQuery) => bail!("Please enter a country name"),
        Err(ResolveError::NoMatch(query)) => {
            println!("No country found for \"{query}\". Check the spelling or try its English name.");
            return Ok(());
        }
    };
    debug!(code = %resolved.code, fallback = resolved.used_fallback, "Resolved");

    let brief = CountryBrief::from_resolved(&resolved);
    let guidance = match &args.ask {
        Some(question) => Some(compose_guidance(&resolved, question)?),
        None => None,
    };

    if args.json {
        let output = Output {
            code: &resolved.code,
            used_fallback: resolved.used_fallback,
            brief: &brief,
            guidance: guidance.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_brief(&brief);
        if let Some(guidance) = &guidance {
            println!("\nGuidance");
            println!("  {}", guidance.text());
        }
    }

    Ok(())
}

fn print_brief(brief: &CountryBrief) {
    println!("{}", "=".repeat(60));
    println!("{}  [{}]", brief.name, brief.risk_badge.label);
    println!("{}", "=".repeat(60));
    if let Some(notice) = &brief.fallback_notice {
        println!("! {notice}");
    }
    println!("Region:     {}", brief.region_text);
    println!("Capital:    {}", brief.capital);
    println!("Population: {}", brief.population_text);
    println!("Languages:  {}", brief.languages_text);
    println!("Currencies: {}", brief.currencies_text);

    println!("\nRisk");
    for bar in &brief.risk_bars {
        println!("  {:24} {}/5", bar.label, bar.score);
    }
    println!("\n{}", brief.advisory_text);
    if let Some(excerpt) = &brief.advisory_excerpt {
        println!("  \"{excerpt}\"");
    }
    if let Some(link) = &brief.advisory_link {
        println!("  {link}");
    }

    println!("\nTop risks");
    for risk in &brief.top_risks {
        println!("  - {risk}");
    }

    println!("\nEmergency contacts");
    for line in &brief.contacts {
        println!("  {:10} {}", line.label, line.value);
    }

    println!("\nMindset: {}", brief.mindset_tip);

    if brief.has_playbook() {
        println!("\nIf something happens");
        for card in &brief.scenarios {
            println!("  {}", card.label);
            for (i, step) in card.steps.iter().enumerate() {
                println!("    {}. {}", i + 1, step);
            }
        }
    }
}
