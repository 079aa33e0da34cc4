//! Safety dataset builder
//!
//! Merges every country REST Countries knows with US State Department
//! travel advisories and optional hand-written presets into the catalog
//! document consumed by [`crate::SafetyCatalog`].
//!
//! # Advisory Levels
//!
//! | Level | Title text                  | Overall risk | Default scores (crime/political/health/natural) |
//! |-------|-----------------------------|--------------|--------------------------------------------------|
//! | 1     | Exercise Normal Precautions | low          | 2 / 2 / 2 / 2                                    |
//! | 2     | Exercise Increased Caution  | medium       | 3 / 3 / 2 / 3                                    |
//! | 3     | Reconsider Travel           | high         | 4 / 4 / 3 / 3                                    |
//! | 4     | Do Not Travel               | high         | 4 / 4 / 3 / 3                                    |
//! | –     | no advisory                 | unknown      | 3 / 3 / 3 / 3                                    |

use crate::countries_api::CountrySourceError;
use crate::{ApiCountry, EmergencyContacts, OverallRisk, Playbook, RiskScores, SafetyRecord};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const TRAVEL_ADVISORY_URL: &str = "https://cadataapi.state.gov/api/TravelAdvisories";

/// Longest advisory excerpt kept, in characters
pub const EXCERPT_MAX_LEN: usize = 260;

/// Top risks extracted from one advisory
pub const MAX_TOP_RISKS: usize = 3;

/// Destinations flagged for rich crisis content
pub const TOURISM_CODES: [&str; 47] = [
    // Europe
    "FR", "IT", "ES", "DE", "GB", "CH", "AT", "NL", "BE", "PT", "GR", "CZ", "HU", "PL", "HR",
    "TR", "IE", "DK", "NO", "SE", "FI",
    // Asia
    "JP", "KR", "CN", "TH", "SG", "MY", "VN", "ID", "PH", "AE", "IN",
    // North America
    "US", "CA", "MX",
    // South America
    "BR", "AR", "CL", "PE", "CO",
    // Oceania
    "AU", "NZ",
    // Middle East / Africa
    "IL", "SA", "EG", "MA", "ZA",
];

/// Advisory keyword → risk label, in output order
const RISK_KEYWORDS: [(&str, &str); 9] = [
    ("unrest", "unrest / protests"),
    ("crime", "violent or petty crime"),
    ("kidnapping", "kidnapping risk"),
    ("landmine", "landmines / unexploded ordnance"),
    ("terrorism", "terrorism risk"),
    ("health", "limited health facilities"),
    ("disease", "infectious disease / outbreaks"),
    ("epidemic", "epidemics / outbreaks"),
    ("natural disaster", "natural hazards"),
];

/// Advisory spellings that differ from REST Countries common names
const COUNTRY_ALIASES: [(&str, &str); 22] = [
    ("burma", "MM"),
    ("myanmar", "MM"),
    ("east timor", "TL"),
    ("timor-leste", "TL"),
    ("czech republic", "CZ"),
    ("czechia", "CZ"),
    ("russia", "RU"),
    ("russian federation", "RU"),
    ("south korea", "KR"),
    ("republic of korea", "KR"),
    ("north korea", "KP"),
    ("democratic people's republic of korea", "KP"),
    ("ivory coast", "CI"),
    ("cote d'ivoire", "CI"),
    ("cote d ivoire", "CI"),
    ("cabo verde", "CV"),
    ("cape verde", "CV"),
    ("the bahamas", "BS"),
    ("bahamas", "BS"),
    ("the gambia", "GM"),
    ("gambia", "GM"),
    ("mexico", "MX"),
];

const GENERIC_TOP_RISKS: [&str; 2] = [
    "keep valuables close in busy areas",
    "check local news if something feels unusual",
];

const DEFAULT_MINDSET_TIP: &str = "Most trips go well. Keep a basic safety routine and share your itinerary with someone you trust.";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static PARENTHETICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("valid regex"));
static LEADING_THE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^the\s+").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static QUALIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmainland\b|\bsee summaries\b").expect("valid regex"));

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Country source error: {0}")]
    Source(#[from] CountrySourceError),
    #[error("Advisory fetch failed: {0}")]
    Advisory(String),
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Raw State Department advisory entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvisoryRecord {
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Summary", default)]
    pub summary: Option<String>,
    #[serde(rename = "Link", default)]
    pub link: Option<String>,
}

/// Advisory matched to a country
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub level: u8,
    /// e.g. "Level 4: Do Not Travel"
    pub raw: String,
    pub overall: OverallRisk,
    pub summary: String,
    pub link: String,
}

/// Split "`Country - Level N: Text`" into country name, level text and level
pub fn parse_advisory_title(title: &str) -> Option<(String, String, u8)> {
    let mut parts = title.split(" - Level");
    let country = parts.next()?.trim().to_string();
    let level_part = format!("Level{}", parts.next()?);
    let level = (1..=4u8).find(|n| level_part.contains(&format!("Level {n}")))?;
    Some((country, level_part.trim().to_string(), level))
}

pub fn overall_from_level(level: u8) -> OverallRisk {
    match level {
        1 => OverallRisk::Low,
        2 => OverallRisk::Medium,
        _ => OverallRisk::High,
    }
}

/// Lowercase advisory country name with boilerplate removed
pub fn normalize_country_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let name = name.replace("Travel Advisory", "");
    let name = PARENTHETICAL_RE.replace_all(name.trim(), "");
    let name = LEADING_THE_RE.replace(&name, "");
    let name = WHITESPACE_RE.replace_all(&name, " ");
    name.trim().to_lowercase()
}

/// Multi-territory titles ("China, mainland & Hong Kong") keep their first part
fn primary_territory(normalized: &str) -> String {
    if !normalized.contains(',') && !normalized.contains('&') {
        return normalized.to_string();
    }
    let first = normalized
        .split(',')
        .next()
        .unwrap_or_default()
        .split('&')
        .next()
        .unwrap_or_default()
        .trim();
    let first = QUALIFIER_RE.replace_all(first, "");
    let first = first.trim();
    if first.is_empty() {
        normalized.to_string()
    } else {
        first.to_string()
    }
}

/// Strip tags, decode entities, collapse whitespace, lowercase
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let text = TAG_RE.replace_all(html, " ");
    let text = html_escape::decode_html_entities(&text);
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Up to three risk labels whose keywords appear in the advisory summary
pub fn extract_top_risks(summary_html: &str) -> Vec<String> {
    let text = html_to_text(summary_html);
    if text.is_empty() {
        return Vec::new();
    }

    let mut risks: Vec<String> = Vec::new();
    for (keyword, label) in RISK_KEYWORDS {
        if text.contains(keyword) && !risks.iter().any(|r| r == label) {
            risks.push(label.to_string());
        }
    }
    risks.truncate(MAX_TOP_RISKS);
    risks
}

/// Plain-text excerpt of at most `max_len` characters, cut at a word boundary
pub fn advisory_excerpt(summary_html: &str, max_len: usize) -> String {
    let text = html_to_text(summary_html);
    if text.chars().count() <= max_len {
        return text;
    }
    let cut: String = text.chars().take(max_len).collect();
    let head = cut.rsplit_once(' ').map(|(head, _)| head).unwrap_or(&cut);
    format!("{head}...")
}

pub fn default_risk_scores(overall: OverallRisk) -> RiskScores {
    match overall {
        OverallRisk::Low => RiskScores::uniform(2),
        OverallRisk::Medium => RiskScores {
            crime: 3,
            political: 3,
            health: 2,
            natural_disaster: 3,
        },
        OverallRisk::High => RiskScores {
            crime: 4,
            political: 4,
            health: 3,
            natural_disaster: 3,
        },
        OverallRisk::Unknown => RiskScores::uniform(3),
    }
}

/// Lowercase name → code lookup preserving insertion order for
/// containment matching
#[derive(Debug, Default)]
struct NameIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl NameIndex {
    fn upsert(&mut self, name: String, code: String) {
        match self.positions.get(&name) {
            Some(&idx) => self.entries[idx].1 = code,
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, code));
            }
        }
    }

    fn exact(&self, name: &str) -> Option<&str> {
        self.positions.get(name).map(|&idx| self.entries[idx].1.as_str())
    }

    fn containing(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.contains(name) || name.contains(key.as_str()))
            .map(|(_, code)| code.as_str())
    }
}

fn alias_code(name: &str) -> Option<&'static str> {
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| name == *alias || alias.contains(name) || name.contains(alias))
        .map(|(_, code)| *code)
}

/// Advisories keyed by country code, plus titles that matched nothing
#[derive(Debug, Default)]
pub struct AdvisoryIndex {
    pub by_code: HashMap<String, Advisory>,
    pub unmatched: Vec<String>,
}

impl AdvisoryIndex {
    pub fn get(&self, code: &str) -> Option<&Advisory> {
        self.by_code.get(code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Match advisory titles to country codes
///
/// Lookup order: exact common name or alias, then alias containment, then
/// common-name containment in either direction.
pub fn build_advisory_index(records: &[AdvisoryRecord], countries: &[ApiCountry]) -> AdvisoryIndex {
    let mut names = NameIndex::default();
    for country in countries {
        let lower = country.name.trim().to_lowercase();
        if !lower.is_empty() {
            names.upsert(lower, country.code.clone());
        }
    }
    for (alias, code) in COUNTRY_ALIASES {
        if countries.iter().any(|c| c.code == code) {
            names.upsert(alias.to_string(), code.to_string());
        }
    }

    let mut index = AdvisoryIndex::default();
    for record in records {
        let Some(title) = record.title.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let Some((country_name, raw, level)) = parse_advisory_title(title) else {
            continue;
        };

        let normalized = primary_territory(&normalize_country_name(&country_name));
        if normalized.is_empty() {
            index.unmatched.push(country_name);
            continue;
        }

        let code = names
            .exact(&normalized)
            .or_else(|| alias_code(&normalized))
            .or_else(|| names.containing(&normalized))
            .map(str::to_string);

        let Some(code) = code else {
            index.unmatched.push(country_name);
            continue;
        };

        debug!(title, code = %code, level, "Matched advisory");
        index.by_code.insert(
            code,
            Advisory {
                level,
                raw,
                overall: overall_from_level(level),
                summary: record.summary.clone().unwrap_or_default(),
                link: record.link.clone().unwrap_or_default(),
            },
        );
    }

    info!("Built advisory index for {} countries", index.len());
    if !index.unmatched.is_empty() {
        let sample: Vec<_> = index.unmatched.iter().take(10).map(String::as_str).collect();
        warn!("Unmatched advisories ({}): {}", index.unmatched.len(), sample.join(", "));
    }
    index
}

/// Partial risk scores in a preset; absent dimensions keep the
/// level-derived default
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetRiskScores {
    pub crime: Option<u8>,
    pub political: Option<u8>,
    pub health: Option<u8>,
    pub natural_disaster: Option<u8>,
}

impl PresetRiskScores {
    fn apply(&self, base: RiskScores) -> RiskScores {
        RiskScores {
            crime: self.crime.unwrap_or(base.crime),
            political: self.political.unwrap_or(base.political),
            health: self.health.unwrap_or(base.health),
            natural_disaster: self.natural_disaster.unwrap_or(base.natural_disaster),
        }
    }
}

/// Hand-curated overrides for one country
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SafetyPreset {
    #[serde(default)]
    pub alt_names: Option<Vec<String>>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub overall_risk: Option<OverallRisk>,
    #[serde(default)]
    pub risk_scores: Option<PresetRiskScores>,
    #[serde(default)]
    pub top_risks: Option<Vec<String>>,
    #[serde(default)]
    pub emergency_contacts: Option<EmergencyContacts>,
    #[serde(default)]
    pub mindset_tip: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient_playbook")]
    pub playbook: Playbook,
    #[serde(default)]
    pub advisory_excerpt: Option<String>,
    #[serde(default)]
    pub advisory_link: Option<String>,
}

/// Load a presets document: JSON object code → preset
pub fn load_presets(path: impl AsRef<Path>) -> Result<HashMap<String, SafetyPreset>> {
    let path = path.as_ref();
    info!("Loading safety presets from {:?}", path);
    let file = File::open(path)?;
    let presets: HashMap<String, SafetyPreset> = serde_json::from_reader(BufReader::new(file))?;
    Ok(presets
        .into_iter()
        .map(|(code, preset)| (code.to_uppercase(), preset))
        .collect())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn default_contacts() -> EmergencyContacts {
    EmergencyContacts {
        police: Some("Local police emergency number".to_string()),
        ambulance: Some("Local medical emergency number".to_string()),
        fire: Some("Local fire emergency number".to_string()),
        unified: None,
        note: Some("Look up these numbers before or right after arrival.".to_string()),
    }
}

/// Build one record per country, in `countries` order
///
/// Overall risk comes from the advisory, else the preset, else unknown.
pub fn merge_country_safety(
    countries: &[ApiCountry],
    advisories: &AdvisoryIndex,
    presets: &HashMap<String, SafetyPreset>,
) -> Vec<SafetyRecord> {
    let empty = SafetyPreset::default();

    countries
        .iter()
        .map(|base| {
            let preset = presets.get(&base.code).unwrap_or(&empty);
            let advisory = advisories.get(&base.code);

            let overall_risk = advisory
                .map(|a| a.overall)
                .or(preset.overall_risk)
                .unwrap_or_default();

            let base_scores = default_risk_scores(overall_risk);
            let risk_scores = preset
                .risk_scores
                .as_ref()
                .map_or(base_scores, |p| p.apply(base_scores));

            let summary = advisory.map(|a| a.summary.as_str()).unwrap_or_default();
            let top_risks = match &preset.top_risks {
                Some(risks) => risks.clone(),
                None => {
                    let auto = extract_top_risks(summary);
                    if auto.is_empty() {
                        GENERIC_TOP_RISKS.iter().map(|s| s.to_string()).collect()
                    } else {
                        auto
                    }
                }
            };

            let region = if base.region.is_empty() {
                preset.region.clone().unwrap_or_default()
            } else {
                base.region.clone()
            };

            let advisory_link = advisory
                .map(|a| a.link.clone())
                .filter(|l| !l.is_empty())
                .or_else(|| preset.advisory_link.clone());

            SafetyRecord {
                code: base.code.clone(),
                name: base.name.clone(),
                alt_names: preset.alt_names.clone().unwrap_or_default(),
                region,
                subregion: base.subregion.clone(),
                is_core_country: TOURISM_CODES.contains(&base.code.as_str()),
                overall_risk,
                risk_scores,
                top_risks,
                emergency_contacts: preset
                    .emergency_contacts
                    .clone()
                    .unwrap_or_else(default_contacts),
                mindset_tip: Some(
                    preset
                        .mindset_tip
                        .clone()
                        .unwrap_or_else(|| DEFAULT_MINDSET_TIP.to_string()),
                ),
                playbook: preset.playbook.clone(),
                advisory_excerpt: preset
                    .advisory_excerpt
                    .clone()
                    .or_else(|| non_empty(advisory_excerpt(summary, EXCERPT_MAX_LEN))),
                advisory_link: advisory_link.and_then(non_empty),
            }
        })
        .collect()
}

/// Catalog document: JSON object code → record, in record order
pub fn to_dataset_json(records: &[SafetyRecord]) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::with_capacity(records.len());
    for record in records {
        map.insert(record.code.clone(), serde_json::to_value(record)?);
    }
    Ok(serde_json::Value::Object(map))
}

/// Build statistics written alongside the dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub generated_at: String,
    pub total_countries: usize,
    pub core_countries: usize,
    pub with_advisory: usize,
    pub unmatched_advisories: Vec<String>,
    pub risk_distribution: HashMap<String, usize>,
}

impl DatasetSummary {
    pub fn new(records: &[SafetyRecord], advisories: &AdvisoryIndex) -> Self {
        let mut risk_distribution = HashMap::new();
        for record in records {
            *risk_distribution
                .entry(record.overall_risk.to_string())
                .or_insert(0) += 1;
        }

        Self {
            generated_at: Utc::now().to_rfc3339(),
            total_countries: records.len(),
            core_countries: records.iter().filter(|r| r.is_core_country).count(),
            with_advisory: records
                .iter()
                .filter(|r| advisories.get(&r.code).is_some())
                .count(),
            unmatched_advisories: advisories.unmatched.clone(),
            risk_distribution,
        }
    }
}

/// Fetch the advisory feed
pub async fn fetch_travel_advisories(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<AdvisoryRecord>> {
    info!("Fetching travel advisory data from {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DatasetError::Advisory(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DatasetError::Advisory(format!(
            "{} returned status: {}",
            url,
            response.status()
        )));
    }

    let records: Vec<AdvisoryRecord> = response
        .json()
        .await
        .map_err(|e| DatasetError::Advisory(e.to_string()))?;
    info!("Got {} advisory records", records.len());
    Ok(records)
}
