//! Display-ready view of a resolved country
//!
//! Everything a front end needs for the info and crisis tabs, as plain
//! strings and numbers. No markup is produced here.

use crate::{OverallRisk, ResolvedCountry, ScenarioKey, DEFAULT_RISK_SCORE};
use serde::Serialize;

/// Crisis view shows at most this many risks and scenarios
pub const MAX_CRISIS_ITEMS: usize = 3;

const DEFAULT_MINDSET: &str = "Move one step at a time, keep your phone charged, and give yourself permission to slow down and make safe choices.";

/// Visual tone of the overall risk badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Low,
    Medium,
    High,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskBadge {
    pub tone: BadgeTone,
    pub label: &'static str,
}

impl RiskBadge {
    pub fn for_risk(risk: OverallRisk) -> Self {
        let (tone, label) = match risk {
            OverallRisk::Low => (BadgeTone::Low, "Risk: Low for most trips"),
            OverallRisk::Medium => (BadgeTone::Medium, "Risk: Mixed · stay aware"),
            OverallRisk::High => (BadgeTone::High, "Risk: High · check advisories"),
            OverallRisk::Unknown => (BadgeTone::Neutral, "Risk: Unknown"),
        };
        Self { tone, label }
    }
}

/// One risk dimension, clamped to 1–5
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBar {
    pub key: &'static str,
    pub label: &'static str,
    pub score: u8,
    pub percent: f64,
}

impl RiskBar {
    fn new(key: &'static str, label: &'static str, raw: u8) -> Self {
        // Zero is treated as missing.
        let raw = if raw == 0 { DEFAULT_RISK_SCORE } else { raw };
        let score = raw.clamp(1, 5);
        Self {
            key,
            label,
            score,
            percent: f64::from(score) / 5.0 * 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactLine {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioCard {
    pub key: ScenarioKey,
    pub label: String,
    pub steps: Vec<String>,
}

/// Both tabs' content for one country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryBrief {
    pub name: String,
    pub region_text: String,
    pub capital: String,
    pub population_text: String,
    pub languages_text: String,
    pub currencies_text: String,
    pub risk_badge: RiskBadge,
    pub risk_bars: Vec<RiskBar>,
    pub advisory_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory_excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory_link: Option<String>,
    /// Set when live data was unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_notice: Option<String>,
    pub is_core_country: bool,
    pub top_risks: Vec<String>,
    pub mindset_tip: String,
    pub contacts: Vec<ContactLine>,
    pub scenarios: Vec<ScenarioCard>,
}

impl CountryBrief {
    pub fn from_resolved(country: &ResolvedCountry) -> Self {
        let api = &country.api;
        let safety = &country.safety;
        let name = country.display_name().to_string();

        let fallback_notice = country.used_fallback.then(|| {
            format!("Showing demo profile for {name} because live data was not available.")
        });

        let contacts = &safety.emergency_contacts;
        let contact = |label, value: &Option<String>, default: &str| ContactLine {
            label,
            value: value
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string()),
        };
        let mut contact_lines = vec![
            contact("Police", &contacts.police, "Check local emergency number"),
            contact("Ambulance", &contacts.ambulance, "Check local medical emergency number"),
            contact("Fire", &contacts.fire, "Check local fire emergency number"),
        ];
        if let Some(unified) = contacts.unified.as_ref().filter(|s| !s.is_empty()) {
            contact_lines.push(ContactLine {
                label: "Unified",
                value: unified.clone(),
            });
        }
        contact_lines.push(contact(
            "Note",
            &contacts.note,
            "Save these numbers in your phone and on paper before you need them.",
        ));

        let scores = &safety.risk_scores;

        Self {
            region_text: region_text(country),
            capital: api.capital.clone(),
            population_text: format_population(api.population),
            languages_text: join_or_na(&api.languages),
            currencies_text: join_or_na(&api.currencies),
            risk_badge: RiskBadge::for_risk(safety.overall_risk),
            risk_bars: vec![
                RiskBar::new("crime", "Crime / petty theft", scores.crime),
                RiskBar::new("political", "Political stability", scores.political),
                RiskBar::new("health", "Health infrastructure", scores.health),
                RiskBar::new("natural_disaster", "Natural hazards", scores.natural_disaster),
            ],
            advisory_text: advisory_text(&name, safety.overall_risk),
            advisory_excerpt: safety.advisory_excerpt.clone().filter(|s| !s.is_empty()),
            advisory_link: safety.advisory_link.clone().filter(|s| !s.is_empty()),
            fallback_notice,
            is_core_country: safety.is_core_country,
            top_risks: safety.top_risks.iter().take(MAX_CRISIS_ITEMS).cloned().collect(),
            mindset_tip: safety
                .mindset_tip
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_MINDSET.to_string()),
            contacts: contact_lines,
            scenarios: safety
                .playbook
                .iter()
                .take(MAX_CRISIS_ITEMS)
                .map(|(key, scenario)| ScenarioCard {
                    key: *key,
                    label: scenario.label.clone(),
                    steps: scenario.steps.clone(),
                })
                .collect(),
            name,
        }
    }

    pub fn has_playbook(&self) -> bool {
        !self.scenarios.is_empty()
    }
}

fn region_text(country: &ResolvedCountry) -> String {
    let api = &country.api;
    match (api.region.as_str(), api.subregion.as_str()) {
        ("", _) if !country.safety.region.is_empty() => country.safety.region.clone(),
        ("", _) => "Region not specified".to_string(),
        (region, "") => region.to_string(),
        (region, subregion) => format!("{region} · {subregion}"),
    }
}

fn join_or_na(items: &[String]) -> String {
    if items.is_empty() {
        "N/A".to_string()
    } else {
        items.join(", ")
    }
}

/// Compact population: `1.4B`, `67.0M`, `3.5K`, or the plain number
pub fn format_population(population: Option<u64>) -> String {
    match population {
        None | Some(0) => "N/A".to_string(),
        Some(n) if n >= 1_000_000_000 => format!("{:.1}B", n as f64 / 1_000_000_000.0),
        Some(n) if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        Some(n) if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        Some(n) => n.to_string(),
    }
}

pub fn advisory_text(name: &str, risk: OverallRisk) -> String {
    let sentence = match risk {
        OverallRisk::Low => format!(
            "{name} is generally considered low-risk for most visitors, especially in everyday situations."
        ),
        OverallRisk::Medium => format!(
            "{name} is usually fine for tourism, but certain situations or locations may need extra awareness."
        ),
        OverallRisk::High => format!(
            "{name} can involve higher levels of risk, so checking current advisories before you go is important."
        ),
        OverallRisk::Unknown => {
            "Risk levels can vary across regions within the same country, and can change over time."
                .to_string()
        }
    };
    format!(
        "{sentence} This interface is a simplified, education-oriented view built on top of live country data and curated safety presets."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{generic_safety, testing::{catalog, france_api}};
    use crate::{ApiCountry, RiskScores};

    fn france() -> ResolvedCountry {
        let safety = catalog().get_by_code("FR").cloned().unwrap();
        ResolvedCountry {
            code: "FR".into(),
            name: "France".into(),
            api: france_api(),
            safety,
            used_fallback: false,
        }
    }

    #[test]
    fn test_population_formatting() {
        assert_eq!(format_population(None), "N/A");
        assert_eq!(format_population(Some(0)), "N/A");
        assert_eq!(format_population(Some(999)), "999");
        assert_eq!(format_population(Some(3_450)), "3.5K");
        assert_eq!(format_population(Some(67_000_000)), "67.0M");
        assert_eq!(format_population(Some(1_412_000_000)), "1.4B");
    }

    #[test]
    fn test_france_brief() {
        let brief = CountryBrief::from_resolved(&france());

        assert_eq!(brief.name, "France");
        assert_eq!(brief.region_text, "Europe · Western Europe");
        assert_eq!(brief.population_text, "67.0M");
        assert_eq!(brief.languages_text, "French");
        assert_eq!(brief.currencies_text, "Euro");
        assert_eq!(brief.risk_badge.tone, BadgeTone::Low);
        assert_eq!(brief.risk_badge.label, "Risk: Low for most trips");
        assert!(brief.advisory_text.starts_with("France is generally considered low-risk"));
        assert!(brief.fallback_notice.is_none());
        assert!(brief.is_core_country);

        let crime = &brief.risk_bars[0];
        assert_eq!((crime.key, crime.score), ("crime", 2));
        assert!((crime.percent - 40.0).abs() < 1e-9);

        let labels: Vec<_> = brief.contacts.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec!["Police", "Ambulance", "Fire", "Unified", "Note"]);
        assert_eq!(brief.contacts[0].value, "17");

        let keys: Vec<_> = brief.scenarios.iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![ScenarioKey::LostPassport, ScenarioKey::ProtestOrStrike]);
        assert!(brief.has_playbook());
        assert_eq!(brief.mindset_tip, "Keep your bag zipped on the metro.");
    }

    #[test]
    fn test_scores_are_clamped() {
        let mut country = france();
        country.safety.risk_scores = RiskScores {
            crime: 9,
            political: 0,
            health: 1,
            natural_disaster: 5,
        };
        let brief = CountryBrief::from_resolved(&country);
        let scores: Vec<u8> = brief.risk_bars.iter().map(|b| b.score).collect();
        assert_eq!(scores, vec![5, 3, 1, 5]);
    }

    #[test]
    fn test_fallback_brief_uses_defaults() {
        let record = catalog().get_by_code("JP").cloned().unwrap();
        let country = ResolvedCountry {
            code: "JP".into(),
            name: "Japan".into(),
            api: ApiCountry::stub_from(&record),
            safety: record,
            used_fallback: true,
        };
        let brief = CountryBrief::from_resolved(&country);

        assert_eq!(
            brief.fallback_notice.as_deref(),
            Some("Showing demo profile for Japan because live data was not available.")
        );
        assert_eq!(brief.region_text, "Asia");
        assert_eq!(brief.capital, "N/A");
        assert_eq!(brief.population_text, "N/A");
        assert_eq!(brief.languages_text, "N/A");
        assert_eq!(brief.contacts[0].value, "Check local emergency number");
        assert_eq!(brief.contacts.len(), 4);
        assert!(brief.mindset_tip.starts_with("Move one step at a time"));
        assert_eq!(
            brief.scenarios.iter().map(|s| s.key).collect::<Vec<_>>(),
            vec![ScenarioKey::Theft, ScenarioKey::Earthquake]
        );
    }

    #[test]
    fn test_generic_brief() {
        let mut api = france_api();
        api.region = String::new();
        let safety = generic_safety(&api);
        let country = ResolvedCountry {
            code: api.code.clone(),
            name: api.name.clone(),
            api,
            safety,
            used_fallback: false,
        };
        let brief = CountryBrief::from_resolved(&country);

        assert_eq!(brief.risk_badge.tone, BadgeTone::Neutral);
        assert_eq!(brief.region_text, "Region not specified");
        assert!(brief.advisory_text.starts_with("Risk levels can vary"));
        assert!(!brief.has_playbook());
        assert!(brief.risk_bars.iter().all(|b| b.score == 3));
    }

    #[test]
    fn test_top_risks_capped() {
        let mut country = france();
        country.safety.top_risks.push("a fourth risk".into());
        let brief = CountryBrief::from_resolved(&country);
        assert_eq!(brief.top_risks.len(), MAX_CRISIS_ITEMS);
    }

    #[test]
    fn test_blank_contacts_use_defaults() {
        let mut country = france();
        country.safety.emergency_contacts.police = Some(String::new());
        country.safety.emergency_contacts.unified = Some(String::new());
        let brief = CountryBrief::from_resolved(&country);

        let labels: Vec<_> = brief.contacts.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec!["Police", "Ambulance", "Fire", "Note"]);
        assert_eq!(brief.contacts[0].value, "Check local emergency number");
        assert_eq!(brief.contacts[1].value, "15");
    }
}
