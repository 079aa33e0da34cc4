//! Country Safety Profile
//!
//! Resolves a free-text country query into a merged profile: live country
//! metadata from REST Countries plus a curated safety overlay (risk scores,
//! emergency contacts, scenario playbooks) from a local dataset.
//!
//! # Resolution Precedence
//!
//! | Live data | Safety overlay taken from                         | `used_fallback` |
//! |-----------|---------------------------------------------------|-----------------|
//! | yes       | catalog by code → catalog by name → generic shell | false           |
//! | no        | catalog by query name (else `NoMatch`)            | true            |
//!
//! # Risk Scores
//!
//! Four dimensions scored 1 (low) – 5 (high): crime, political, health and
//! natural disaster. A dimension missing from the dataset reads as 3.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub mod brief;
pub mod catalog;
pub mod countries_api;
pub mod dataset;
pub mod guidance;
pub mod resolver;
pub mod session;

pub use brief::CountryBrief;
pub use catalog::{CatalogError, CatalogHandle, CatalogSource, SafetyCatalog};
pub use countries_api::{CountrySource, CountrySourceError, RestCountriesClient, RestCountriesConfig};
pub use guidance::{compose_guidance, Guidance, GuidanceError};
pub use resolver::CountryResolver;
pub use session::Session;

/// Score used for any risk dimension the dataset does not provide
pub const DEFAULT_RISK_SCORE: u8 = 3;

/// Capital shown when neither source knows it
pub const UNKNOWN_CAPITAL: &str = "N/A";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Query is empty")]
    EmptyQuery,
    #[error("No live or catalog country matches {0:?}")]
    NoMatch(String),
}

/// Overall advisory level for a country
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallRisk {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl OverallRisk {
    /// Lenient parse; anything unrecognised is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OverallRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OverallRisk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse).unwrap_or_default())
    }
}

/// Per-dimension risk scores, 1 (low) – 5 (high)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScores {
    #[serde(default = "default_score", deserialize_with = "score_or_default")]
    pub crime: u8,
    #[serde(default = "default_score", deserialize_with = "score_or_default")]
    pub political: u8,
    #[serde(default = "default_score", deserialize_with = "score_or_default")]
    pub health: u8,
    #[serde(default = "default_score", deserialize_with = "score_or_default")]
    pub natural_disaster: u8,
}

impl RiskScores {
    pub const fn uniform(score: u8) -> Self {
        Self {
            crime: score,
            political: score,
            health: score,
            natural_disaster: score,
        }
    }
}

impl Default for RiskScores {
    fn default() -> Self {
        Self::uniform(DEFAULT_RISK_SCORE)
    }
}

fn default_score() -> u8 {
    DEFAULT_RISK_SCORE
}

fn score_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(Option::<u8>::deserialize(deserializer)?.unwrap_or(DEFAULT_RISK_SCORE))
}

/// Emergency numbers and a free-text note; every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub police: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambulance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire: Option<String>,
    /// Single number covering all services (e.g. 112)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Crisis scenarios a playbook may cover
///
/// Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKey {
    LostPassport,
    Theft,
    ProtestOrStrike,
    Earthquake,
    HeatWave,
    HealthIssue,
}

impl ScenarioKey {
    pub const ALL: [ScenarioKey; 6] = [
        ScenarioKey::LostPassport,
        ScenarioKey::Theft,
        ScenarioKey::ProtestOrStrike,
        ScenarioKey::Earthquake,
        ScenarioKey::HeatWave,
        ScenarioKey::HealthIssue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LostPassport => "lost_passport",
            Self::Theft => "theft",
            Self::ProtestOrStrike => "protest_or_strike",
            Self::Earthquake => "earthquake",
            Self::HeatWave => "heat_wave",
            Self::HealthIssue => "health_issue",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit `null` reads the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Labelled, ordered response steps for one scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioPlaybook {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<String>,
}

pub type Playbook = BTreeMap<ScenarioKey, ScenarioPlaybook>;

/// Playbook entries under keys outside the fixed scenario set are dropped.
pub(crate) fn lenient_playbook<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Playbook, D::Error> {
    let raw = Option::<BTreeMap<String, ScenarioPlaybook>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, scenario)| ScenarioKey::from_key(&key).map(|k| (k, scenario)))
        .collect())
}

/// Curated safety profile for one country
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRecord {
    /// ISO 3166-1 alpha-2 code; filled from the dataset key when absent
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alt_names: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub region: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub subregion: String,
    /// Gates rich crisis content (playbook, curated contacts)
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_core_country: bool,
    #[serde(default)]
    pub overall_risk: OverallRisk,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk_scores: RiskScores,
    #[serde(default, deserialize_with = "null_as_default")]
    pub top_risks: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub emergency_contacts: EmergencyContacts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mindset_tip: Option<String>,
    #[serde(default, deserialize_with = "lenient_playbook")]
    pub playbook: Playbook,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory_excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory_link: Option<String>,
}

impl SafetyRecord {
    /// True when `name` equals the canonical name or any alternate spelling,
    /// ignoring case
    pub fn matches_name(&self, name: &str) -> bool {
        let needle = name.to_lowercase();
        self.name.to_lowercase() == needle
            || self.alt_names.iter().any(|alt| alt.to_lowercase() == needle)
    }
}

/// Normalized country metadata from the external source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCountry {
    pub code: String,
    pub name: String,
    pub region: String,
    pub subregion: String,
    pub capital: String,
    pub population: Option<u64>,
    pub languages: Vec<String>,
    pub currencies: Vec<String>,
}

impl ApiCountry {
    /// Minimal metadata derived from a catalog record when live data is unavailable
    pub fn stub_from(record: &SafetyRecord) -> Self {
        Self {
            code: record.code.clone(),
            name: record.name.clone(),
            region: record.region.clone(),
            subregion: String::new(),
            capital: UNKNOWN_CAPITAL.to_string(),
            population: None,
            languages: Vec::new(),
            currencies: Vec::new(),
        }
    }
}

/// Merged result of one resolve call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCountry {
    pub code: String,
    pub name: String,
    pub api: ApiCountry,
    pub safety: SafetyRecord,
    /// True when live data was unavailable and the catalog supplied everything
    pub used_fallback: bool,
}

impl ResolvedCountry {
    /// Name to address the traveller with: curated name first, then live name
    pub fn display_name(&self) -> &str {
        if self.safety.name.is_empty() {
            &self.api.name
        } else {
            &self.safety.name
        }
    }
}
