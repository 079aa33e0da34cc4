//! Keyword scenario classifier and templated guidance
//!
//! Questions are matched against an ordered rule table; the first rule with
//! any pattern contained in the lowercased question decides the scenario.
//! Matching is plain substring containment, so short patterns such as `id`
//! or `ill` also fire inside longer words.
//!
//! | # | Patterns                                      | Primary             | Fallback        |
//! |---|-----------------------------------------------|---------------------|-----------------|
//! | 1 | passport, id, identity, visa                  | `lost_passport`     | `theft`         |
//! | 2 | theft, stolen, pickpocket, robbed, bag        | `theft`             | `lost_passport` |
//! | 3 | protest, demonstration, strike, riot, unrest  | `protest_or_strike` | –               |
//! | 4 | earthquake, shake, tremor, quake              | `earthquake`        | –               |
//! | 5 | heat, hot, sun, sunburn                       | `heat_wave`         | –               |
//! | 6 | sick, ill, fever, injury, hurt, hospital      | `health_issue`      | –               |

use crate::{Playbook, ResolvedCountry, ScenarioKey};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuidanceError {
    #[error("Search a country first so the right safety playbook can be used")]
    NoCountrySelected,
    #[error("Describe briefly what is happening")]
    EmptyQuestion,
}

/// One row of the classifier table
#[derive(Debug, Clone, Copy)]
pub struct ScenarioRule {
    pub patterns: &'static [&'static str],
    pub primary: ScenarioKey,
    pub fallback: Option<ScenarioKey>,
}

impl ScenarioRule {
    pub fn matches(&self, lowercase_question: &str) -> bool {
        self.patterns.iter().any(|p| lowercase_question.contains(p))
    }

    /// Primary if the playbook has it, else fallback if the playbook has it
    pub fn pick(&self, playbook: &Playbook) -> Option<ScenarioKey> {
        std::iter::once(self.primary)
            .chain(self.fallback)
            .find(|key| playbook.contains_key(key))
    }
}

pub const SCENARIO_RULES: [ScenarioRule; 6] = [
    ScenarioRule {
        patterns: &["passport", "id", "identity", "visa"],
        primary: ScenarioKey::LostPassport,
        fallback: Some(ScenarioKey::Theft),
    },
    ScenarioRule {
        patterns: &["theft", "stolen", "pickpocket", "robbed", "bag"],
        primary: ScenarioKey::Theft,
        fallback: Some(ScenarioKey::LostPassport),
    },
    ScenarioRule {
        patterns: &["protest", "demonstration", "strike", "riot", "unrest"],
        primary: ScenarioKey::ProtestOrStrike,
        fallback: None,
    },
    ScenarioRule {
        patterns: &["earthquake", "shake", "tremor", "quake"],
        primary: ScenarioKey::Earthquake,
        fallback: None,
    },
    ScenarioRule {
        patterns: &["heat", "hot", "sun", "sunburn"],
        primary: ScenarioKey::HeatWave,
        fallback: None,
    },
    ScenarioRule {
        patterns: &["sick", "ill", "fever", "injury", "hurt", "hospital"],
        primary: ScenarioKey::HealthIssue,
        fallback: None,
    },
];

/// First rule whose patterns appear in `question`
pub fn matching_rule(question: &str) -> Option<&'static ScenarioRule> {
    let q = question.to_lowercase();
    SCENARIO_RULES.iter().find(|rule| rule.matches(&q))
}

/// Scenario to answer `question` with, given what `playbook` covers
///
/// Only the first matching rule is consulted; a later rule is never tried
/// when the first one's scenarios are missing.
pub fn classify(question: &str, playbook: &Playbook) -> Option<ScenarioKey> {
    matching_rule(question).and_then(|rule| rule.pick(playbook))
}

const DEFAULT_THIRD_STEP: &str = "move to a busier, well-lit place and consider calling local emergency services or your embassy for support";

/// Templated answer to a free-text safety question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guidance {
    Scenario { scenario: ScenarioKey, text: String },
    Generic { text: String },
}

impl Guidance {
    pub fn text(&self) -> &str {
        match self {
            Self::Scenario { text, .. } | Self::Generic { text } => text,
        }
    }

    pub fn scenario(&self) -> Option<ScenarioKey> {
        match self {
            Self::Scenario { scenario, .. } => Some(*scenario),
            Self::Generic { .. } => None,
        }
    }
}

fn generic_guidance(name: &str) -> String {
    format!(
        "Thanks for explaining what’s happening. Because this situation doesn’t match one of the preset scenarios for {name}, start with the basics: move to a place that feels physically safe, make sure your phone has enough battery, and let at least one trusted person know where you are. If you feel in immediate danger, contact local emergency services or head into a hotel, café, or public transport hub to ask for help. You can also keep notes of time, place, and people involved for any later reports or insurance claims."
    )
}

/// Build the guidance paragraph for `question` about `country`
pub fn compose_guidance(country: &ResolvedCountry, question: &str) -> Result<Guidance, GuidanceError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(GuidanceError::EmptyQuestion);
    }

    let name = country.display_name();
    let playbook = &country.safety.playbook;

    let Some((scenario, entry)) = classify(question, playbook)
        .and_then(|key| playbook.get(&key).map(|entry| (key, entry)))
    else {
        return Ok(Guidance::Generic {
            text: generic_guidance(name),
        });
    };

    let step = |i: usize| entry.steps.get(i).map(String::as_str).unwrap_or("");
    let third = match step(2) {
        "" => DEFAULT_THIRD_STEP,
        s => s,
    };

    let text = format!(
        "You’re in {name}, and it sounds like you’re going through a situation similar to “{label}”. First, {first} Then, {second} If you still feel unsafe or unsure after these first steps, {third} Remember you don’t need to solve everything at once – just one safe next step at a time is enough.",
        label = entry.label,
        first = step(0),
        second = step(1),
    );

    Ok(Guidance::Scenario { scenario, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::testing::{catalog, france_api};
    use crate::{ApiCountry, ScenarioPlaybook};
    use proptest::prelude::*;

    fn playbook(keys: &[ScenarioKey]) -> Playbook {
        keys.iter()
            .map(|&k| {
                (
                    k,
                    ScenarioPlaybook {
                        label: k.as_str().to_string(),
                        steps: vec!["a".into(), "b".into(), "c".into()],
                    },
                )
            })
            .collect()
    }

    fn resolved(code: &str) -> ResolvedCountry {
        let record = catalog().get_by_code(code).cloned().unwrap();
        ResolvedCountry {
            code: record.code.clone(),
            name: record.name.clone(),
            api: ApiCountry::stub_from(&record),
            safety: record,
            used_fallback: true,
        }
    }

    #[test]
    fn test_rule_table_is_pinned() {
        let table: Vec<(Vec<&str>, ScenarioKey, Option<ScenarioKey>)> = SCENARIO_RULES
            .iter()
            .map(|r| (r.patterns.to_vec(), r.primary, r.fallback))
            .collect();

        assert_eq!(
            table,
            vec![
                (vec!["passport", "id", "identity", "visa"], ScenarioKey::LostPassport, Some(ScenarioKey::Theft)),
                (vec!["theft", "stolen", "pickpocket", "robbed", "bag"], ScenarioKey::Theft, Some(ScenarioKey::LostPassport)),
                (vec!["protest", "demonstration", "strike", "riot", "unrest"], ScenarioKey::ProtestOrStrike, None),
                (vec!["earthquake", "shake", "tremor", "quake"], ScenarioKey::Earthquake, None),
                (vec!["heat", "hot", "sun", "sunburn"], ScenarioKey::HeatWave, None),
                (vec!["sick", "ill", "fever", "injury", "hurt", "hospital"], ScenarioKey::HealthIssue, None),
            ]
        );
    }

    #[test]
    fn test_passport_cross_fallback() {
        let q = "I lost my PASSPORT";
        assert_eq!(
            classify(q, &playbook(&[ScenarioKey::LostPassport, ScenarioKey::Theft])),
            Some(ScenarioKey::LostPassport)
        );
        assert_eq!(classify(q, &playbook(&[ScenarioKey::Theft])), Some(ScenarioKey::Theft));
        assert_eq!(classify(q, &playbook(&[ScenarioKey::Earthquake])), None);
    }

    #[test]
    fn test_theft_cross_fallback() {
        let q = "someone stole my bag";
        assert_eq!(classify(q, &playbook(&[ScenarioKey::LostPassport])), Some(ScenarioKey::LostPassport));
        assert_eq!(classify(q, &playbook(&[])), None);
    }

    #[test]
    fn test_no_fallback_outside_passport_and_theft() {
        let all = playbook(&[ScenarioKey::LostPassport, ScenarioKey::Theft]);
        assert_eq!(classify("a riot broke out downtown", &all), None);
        assert_eq!(classify("the ground began to shake", &all), None);
    }

    #[test]
    fn test_first_category_wins() {
        // Matches rule 1 ("visa") and rule 3 ("strike"); rule 1 decides even
        // though only the strike scenario exists.
        let pb = playbook(&[ScenarioKey::ProtestOrStrike]);
        assert_eq!(classify("visa office closed by a strike", &pb), None);
        assert_eq!(classify("airport strike", &pb), Some(ScenarioKey::ProtestOrStrike));
    }

    #[test]
    fn test_each_category() {
        let all = playbook(&ScenarioKey::ALL);
        assert_eq!(classify("my wallet was stolen", &all), Some(ScenarioKey::Theft));
        assert_eq!(classify("big demonstration downtown", &all), Some(ScenarioKey::ProtestOrStrike));
        assert_eq!(classify("felt a tremor", &all), Some(ScenarioKey::Earthquake));
        assert_eq!(classify("it is so hot today", &all), Some(ScenarioKey::HeatWave));
        assert_eq!(classify("I have a fever", &all), Some(ScenarioKey::HealthIssue));
        assert_eq!(classify("where can I buy a train ticket", &all), None);
    }

    #[test]
    fn test_substring_matching_is_literal() {
        // "id" inside "did" routes to the passport rule.
        assert_eq!(matching_rule("I did nothing wrong").map(|r| r.primary), Some(ScenarioKey::LostPassport));
        assert_eq!(matching_rule("lost my way").map(|r| r.primary), None);
    }

    #[test]
    fn test_scenario_guidance_uses_steps() {
        let france = resolved("FR");
        let guidance = compose_guidance(&france, "I lost my passport at the station").unwrap();

        assert_eq!(guidance.scenario(), Some(ScenarioKey::LostPassport));
        let text = guidance.text();
        assert!(text.starts_with("You’re in France"));
        assert!(text.contains("“Lost passport”"));
        assert!(text.contains("First, Report the loss at the nearest police station."));
        assert!(text.contains("Then, Contact your embassy"));
        assert!(text.contains("first steps, Keep copies of your ID in your email."));
    }

    #[test]
    fn test_missing_third_step_uses_default() {
        let france = resolved("FR");
        let guidance = compose_guidance(&france, "There is a strike at the airport").unwrap();

        assert_eq!(guidance.scenario(), Some(ScenarioKey::ProtestOrStrike));
        assert!(guidance.text().contains(DEFAULT_THIRD_STEP));
    }

    #[test]
    fn test_unmatched_question_is_generic() {
        let japan = resolved("JP");
        let guidance = compose_guidance(&japan, "I feel a bit lost").unwrap();
        assert_eq!(guidance.scenario(), None);
        assert!(guidance.text().contains("preset scenarios for Japan"));

        // Passport question, Japan only has theft: cross-fallback applies.
        let guidance = compose_guidance(&japan, "passport gone").unwrap();
        assert_eq!(guidance.scenario(), Some(ScenarioKey::Theft));
    }

    #[test]
    fn test_blank_question_rejected() {
        let france = resolved("FR");
        assert_eq!(compose_guidance(&france, "   "), Err(GuidanceError::EmptyQuestion));
    }

    #[test]
    fn test_generic_country_always_generic() {
        let api = france_api();
        let safety = crate::resolver::generic_safety(&api);
        let country = ResolvedCountry {
            code: api.code.clone(),
            name: api.name.clone(),
            api,
            safety,
            used_fallback: false,
        };
        let guidance = compose_guidance(&country, "my passport is gone").unwrap();
        assert!(matches!(guidance, Guidance::Generic { .. }));
    }

    proptest! {
        #[test]
        fn prop_classification_ignores_case(q in "[a-zA-Z ]{0,40}") {
            let all = playbook(&ScenarioKey::ALL);
            prop_assert_eq!(classify(&q, &all), classify(&q.to_uppercase(), &all));
            prop_assert_eq!(classify(&q, &all), classify(&q.to_lowercase(), &all));
        }

        #[test]
        fn prop_passport_always_lost_passport_when_present(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
            let q = format!("{prefix}passport{suffix}");
            let pb = playbook(&[ScenarioKey::LostPassport]);
            prop_assert_eq!(classify(&q, &pb), Some(ScenarioKey::LostPassport));
        }
    }
}
