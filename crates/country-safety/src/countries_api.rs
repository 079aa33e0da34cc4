//! REST Countries integration
//!
//! Looks a country up by name at `restcountries.com/v3.1/name/{query}`,
//! first as an exact (`fullText=true`) match and then, if that attempt does
//! not succeed, as a fuzzy match of the same query.
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = RestCountriesClient::new(RestCountriesConfig::default())?;
//! let france = client.fetch_country("France").await?;
//! assert_eq!(france.code, "FR");
//! ```

use crate::{ApiCountry, UNKNOWN_CAPITAL};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Fields requested from REST Countries
pub const COUNTRY_FIELDS: &str =
    "name,cca2,region,subregion,capital,population,languages,currencies";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountrySourceError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("REST Countries returned status {status} for {query:?}")]
    Status { status: u16, query: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Country not found: {0:?}")]
    NotFound(String),
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for CountrySourceError {
    fn from(err: reqwest::Error) -> Self {
        CountrySourceError::RequestFailed(err.to_string())
    }
}

impl From<serde_json::Error> for CountrySourceError {
    fn from(err: serde_json::Error) -> Self {
        CountrySourceError::Parse(err.to_string())
    }
}

/// External country metadata source
#[async_trait]
pub trait CountrySource: Send + Sync {
    /// Look up one country by free-text name
    async fn fetch_country(&self, query: &str) -> Result<ApiCountry, CountrySourceError>;
}

/// REST Countries client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestCountriesConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_sec: u64,
}

impl Default for RestCountriesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://restcountries.com/v3.1".to_string(),
            timeout_sec: 10,
        }
    }
}

/// Raw REST Countries record
#[derive(Debug, Default, Deserialize)]
struct RawCountry {
    #[serde(default)]
    name: Option<RawName>,
    #[serde(default)]
    cca2: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    subregion: Option<String>,
    #[serde(default)]
    capital: Option<Vec<String>>,
    #[serde(default)]
    population: Option<u64>,
    /// ISO 639-3 code → language name
    #[serde(default)]
    languages: Option<serde_json::Map<String, serde_json::Value>>,
    /// ISO 4217 code → {name, symbol}
    #[serde(default)]
    currencies: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawName {
    #[serde(default)]
    common: Option<String>,
}

impl RawCountry {
    fn normalize(self) -> ApiCountry {
        let languages = self
            .languages
            .map(|langs| {
                langs
                    .into_iter()
                    .filter_map(|(_, v)| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let currencies = self
            .currencies
            .map(|currs| {
                currs
                    .into_iter()
                    .filter_map(|(_, v)| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        ApiCountry {
            code: self.cca2.unwrap_or_default().to_uppercase(),
            name: self.name.and_then(|n| n.common).unwrap_or_default(),
            region: self.region.unwrap_or_default(),
            subregion: self.subregion.unwrap_or_default(),
            capital: self
                .capital
                .and_then(|c| c.into_iter().next())
                .unwrap_or_else(|| UNKNOWN_CAPITAL.to_string()),
            population: self.population.filter(|&p| p > 0),
            languages,
            currencies,
        }
    }
}

/// Normalize a REST Countries body: an object, or an array whose first
/// element is used
pub fn parse_country_response(body: &str, query: &str) -> Result<ApiCountry, CountrySourceError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let item = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| CountrySourceError::NotFound(query.to_string()))?,
        other => other,
    };

    let raw: RawCountry = serde_json::from_value(item)?;
    let country = raw.normalize();
    if country.code.is_empty() {
        return Err(CountrySourceError::NotFound(query.to_string()));
    }
    Ok(country)
}

/// Normalize the `/all` listing, skipping records without a code
pub fn parse_country_list(body: &str) -> Result<Vec<ApiCountry>, CountrySourceError> {
    let raw: Vec<RawCountry> = serde_json::from_str(body)?;
    Ok(raw
        .into_iter()
        .map(RawCountry::normalize)
        .filter(|c| !c.code.is_empty())
        .collect())
}

/// REST Countries HTTP client
pub struct RestCountriesClient {
    config: RestCountriesConfig,
    client: reqwest::Client,
}

impl RestCountriesClient {
    pub fn new(config: RestCountriesConfig) -> Result<Self, CountrySourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RestCountriesConfig {
        &self.config
    }

    /// `{base}/name/{query}?[fullText=true&]fields=...` with the query
    /// percent-encoded as one path segment
    pub fn name_url(&self, query: &str, full_text: bool) -> Result<Url, CountrySourceError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| CountrySourceError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CountrySourceError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .push("name")
            .push(query);

        {
            let mut pairs = url.query_pairs_mut();
            if full_text {
                pairs.append_pair("fullText", "true");
            }
            pairs.append_pair("fields", COUNTRY_FIELDS);
        }
        Ok(url)
    }

    fn all_url(&self) -> Result<Url, CountrySourceError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| CountrySourceError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CountrySourceError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .push("all");
        url.query_pairs_mut().append_pair("fields", COUNTRY_FIELDS);
        Ok(url)
    }

    async fn attempt(&self, query: &str, full_text: bool) -> Result<String, CountrySourceError> {
        let url = self.name_url(query, full_text)?;
        debug!(%url, full_text, "Querying REST Countries");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CountrySourceError::Status {
                status: status.as_u16(),
                query: query.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// Every country REST Countries knows, in API order
    pub async fn fetch_all(&self) -> Result<Vec<ApiCountry>, CountrySourceError> {
        let url = self.all_url()?;
        debug!(%url, "Fetching all countries");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CountrySourceError::Status {
                status: status.as_u16(),
                query: "all".to_string(),
            });
        }
        parse_country_list(&response.text().await?)
    }
}

#[async_trait]
impl CountrySource for RestCountriesClient {
    async fn fetch_country(&self, query: &str) -> Result<ApiCountry, CountrySourceError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(CountrySourceError::NotFound(String::new()));
        }

        // Exact match first, then fuzzy on any non-success status.
        let body = match self.attempt(trimmed, true).await {
            Ok(body) => body,
            Err(CountrySourceError::Status { status, .. }) => {
                debug!(status, query = trimmed, "Exact match failed, retrying fuzzy");
                match self.attempt(trimmed, false).await {
                    Err(CountrySourceError::Status { status, .. })
                        if status == StatusCode::NOT_FOUND.as_u16() =>
                    {
                        return Err(CountrySourceError::NotFound(trimmed.to_string()));
                    }
                    other => other?,
                }
            }
            Err(e) => return Err(e),
        };

        parse_country_response(&body, trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRANCE: &str = r#"[{
        "name": {"common": "France", "official": "French Republic"},
        "cca2": "FR",
        "region": "Europe",
        "subregion": "Western Europe",
        "capital": ["Paris"],
        "population": 67000000,
        "languages": {"fra": "French"},
        "currencies": {"EUR": {"name": "Euro", "symbol": "€"}}
    }]"#;

    #[test]
    fn test_parse_array_response_uses_first_element() {
        let country = parse_country_response(FRANCE, "France").unwrap();
        assert_eq!(country.code, "FR");
        assert_eq!(country.name, "France");
        assert_eq!(country.region, "Europe");
        assert_eq!(country.subregion, "Western Europe");
        assert_eq!(country.capital, "Paris");
        assert_eq!(country.population, Some(67_000_000));
        assert_eq!(country.languages, vec!["French"]);
        assert_eq!(country.currencies, vec!["Euro"]);
    }

    #[test]
    fn test_parse_object_response() {
        let body = r#"{
            "name": {"common": "Switzerland"},
            "cca2": "ch",
            "languages": {"fra": "French", "gsw": "Swiss German", "ita": "Italian", "roh": "Romansh"},
            "currencies": {"CHF": {"name": "Swiss franc"}}
        }"#;
        let country = parse_country_response(body, "switzerland").unwrap();
        assert_eq!(country.code, "CH");
        assert_eq!(
            country.languages,
            vec!["French", "Swiss German", "Italian", "Romansh"]
        );
        assert_eq!(country.capital, "N/A");
        assert_eq!(country.population, None);
        assert_eq!(country.region, "");
    }

    #[test]
    fn test_parse_empty_array_is_not_found() {
        assert_eq!(
            parse_country_response("[]", "Atlantis"),
            Err(CountrySourceError::NotFound("Atlantis".into()))
        );
    }

    #[test]
    fn test_parse_record_without_code_is_not_found() {
        let body = r#"[{"name": {"common": "Atlantis"}}]"#;
        assert!(matches!(
            parse_country_response(body, "Atlantis"),
            Err(CountrySourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_zero_population_is_null() {
        let body = r#"{"name": {"common": "Antarctica"}, "cca2": "AQ", "population": 0, "capital": []}"#;
        let country = parse_country_response(body, "Antarctica").unwrap();
        assert_eq!(country.population, None);
        assert_eq!(country.capital, "N/A");
    }

    #[test]
    fn test_parse_country_list_skips_missing_codes() {
        let body = r#"[
            {"name": {"common": "France"}, "cca2": "FR"},
            {"name": {"common": "Nowhere"}},
            {"name": {"common": "Japan"}, "cca2": "JP"}
        ]"#;
        let countries = parse_country_list(body).unwrap();
        let codes: Vec<_> = countries.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["FR", "JP"]);
    }

    #[test]
    fn test_name_url_shapes() {
        let client = RestCountriesClient::new(RestCountriesConfig::default()).unwrap();

        let exact = client.name_url("United Kingdom", true).unwrap();
        assert_eq!(exact.path(), "/v3.1/name/United%20Kingdom");
        assert!(exact.query().unwrap().starts_with("fullText=true&fields="));

        let fuzzy = client.name_url("United Kingdom", false).unwrap();
        assert!(fuzzy.query().unwrap().starts_with("fields="));
        assert!(!fuzzy.query().unwrap().contains("fullText"));
    }

    #[test]
    fn test_name_url_escapes_slashes() {
        let client = RestCountriesClient::new(RestCountriesConfig {
            base_url: "https://mirror.example.org/v3.1/".into(),
            timeout_sec: 5,
        })
        .unwrap();
        let url = client.name_url("a/b", true).unwrap();
        assert_eq!(url.path(), "/v3.1/name/a%2Fb");
    }

    #[tokio::test]
    async fn test_blank_query_never_hits_network() {
        let client = RestCountriesClient::new(RestCountriesConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_sec: 1,
        })
        .unwrap();
        assert!(matches!(
            client.fetch_country("   ").await,
            Err(CountrySourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_failure() {
        let client = RestCountriesClient::new(RestCountriesConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_sec: 1,
        })
        .unwrap();
        assert!(matches!(
            client.fetch_country("France").await,
            Err(CountrySourceError::RequestFailed(_))
        ));
    }
}
