//! Query → merged country resolution

use crate::catalog::{CatalogHandle, SafetyCatalog};
use crate::countries_api::{CountrySource, CountrySourceError};
use crate::{
    ApiCountry, EmergencyContacts, OverallRisk, Playbook, ResolveError, ResolvedCountry,
    RiskScores, SafetyRecord, DEFAULT_RISK_SCORE,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const GENERIC_TOP_RISKS: [&str; 2] = [
    "keep valuables close in busy areas",
    "check local news if something feels unusual",
];

const GENERIC_MINDSET_TIP: &str = "Most trips go well. Keep a basic safety routine, share your itinerary with someone you trust, and stay aware of your surroundings.";

/// Safety overlay for a country the curated dataset does not cover
pub fn generic_safety(api: &ApiCountry) -> SafetyRecord {
    SafetyRecord {
        code: api.code.clone(),
        name: api.name.clone(),
        alt_names: Vec::new(),
        region: api.region.clone(),
        subregion: api.subregion.clone(),
        is_core_country: false,
        overall_risk: OverallRisk::Unknown,
        risk_scores: RiskScores::uniform(DEFAULT_RISK_SCORE),
        top_risks: GENERIC_TOP_RISKS.iter().map(|s| s.to_string()).collect(),
        emergency_contacts: EmergencyContacts {
            police: Some("Local emergency number".to_string()),
            ambulance: Some("Local medical emergency number".to_string()),
            fire: Some("Local fire emergency number".to_string()),
            unified: None,
            note: Some(
                "Look up the specific emergency numbers before or right after arrival."
                    .to_string(),
            ),
        },
        mindset_tip: Some(GENERIC_MINDSET_TIP.to_string()),
        playbook: Playbook::new(),
        advisory_excerpt: None,
        advisory_link: None,
    }
}

/// Combine the outcome of the live lookup with the catalog
///
/// Live data present: overlay by code, then by live name, then generic.
/// Live data absent: the catalog must know the query by name.
pub fn merge(
    query: &str,
    live: Result<ApiCountry, CountrySourceError>,
    catalog: &SafetyCatalog,
) -> Result<ResolvedCountry, ResolveError> {
    match live {
        Ok(api) => {
            let safety = if let Some(record) = catalog.get_by_code(&api.code) {
                debug!(code = %api.code, "Safety overlay matched by code");
                record.clone()
            } else if let Some(record) = catalog.find_by_name(&api.name) {
                debug!(name = %api.name, code = %record.code, "Safety overlay matched by name");
                record.clone()
            } else {
                debug!(code = %api.code, "No curated safety overlay, using generic");
                generic_safety(&api)
            };

            Ok(ResolvedCountry {
                code: api.code.clone(),
                name: api.name.clone(),
                api,
                safety,
                used_fallback: false,
            })
        }
        Err(_) => {
            let record = catalog
                .find_by_name(query)
                .ok_or_else(|| ResolveError::NoMatch(query.trim().to_string()))?;
            debug!(code = %record.code, "Using catalog-only profile");

            let api = ApiCountry::stub_from(record);
            Ok(ResolvedCountry {
                code: api.code.clone(),
                name: api.name.clone(),
                api,
                safety: record.clone(),
                used_fallback: true,
            })
        }
    }
}

/// Resolves free-text queries against a country source and the safety catalog
pub struct CountryResolver<S: ?Sized> {
    source: Arc<S>,
    catalog: CatalogHandle,
}

impl<S: ?Sized> Clone for CountryResolver<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            catalog: self.catalog.clone(),
        }
    }
}

impl<S: CountrySource + ?Sized> CountryResolver<S> {
    pub fn new(source: Arc<S>, catalog: CatalogHandle) -> Self {
        Self { source, catalog }
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Resolve `query` into a fully merged country
    ///
    /// A failed live lookup is logged and answered from the catalog; the
    /// caller only ever sees `EmptyQuery` or `NoMatch`.
    pub async fn resolve(&self, query: &str) -> Result<ResolvedCountry, ResolveError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::EmptyQuery);
        }

        let live = self.source.fetch_country(trimmed).await;
        if let Err(e) = &live {
            warn!(query = trimmed, error = %e, "Live country data unavailable, falling back to catalog");
        }

        let catalog = self.catalog.snapshot().await;
        let resolved = merge(trimmed, live, &catalog)?;

        info!(
            query = trimmed,
            code = %resolved.code,
            risk = %resolved.safety.overall_risk,
            used_fallback = resolved.used_fallback,
            "Resolved country"
        );
        Ok(resolved)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn resolver(source: FakeSource) -> (CountryResolver<FakeSource>, Arc<FakeSource>) {
        let source = Arc::new(source);
        let resolver = CountryResolver::new(Arc::clone(&source), CatalogHandle::ready(catalog()));
        (resolver, source)
    }

    #[tokio::test]
    async fn test_france_live_and_curated() {
        let (resolver, _) = resolver(FakeSource::with(vec![france_api()]));
        let resolved = resolver.resolve("France").await.unwrap();

        assert_eq!(resolved.code, "FR");
        assert!(!resolved.used_fallback);
        assert_eq!(resolved.safety.overall_risk, OverallRisk::Low);
        assert_eq!(resolved.safety.risk_scores.crime, 2);
        assert_eq!(resolved.api.capital, "Paris");
    }

    #[tokio::test]
    async fn test_empty_query_never_fetches() {
        let (resolver, source) = resolver(FakeSource::with(vec![france_api()]));

        assert_eq!(resolver.resolve("").await, Err(ResolveError::EmptyQuery));
        assert_eq!(resolver.resolve("  \t ").await, Err(ResolveError::EmptyQuery));
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_everywhere_is_no_match() {
        let (resolver, source) = resolver(FakeSource::default());
        assert_eq!(
            resolver.resolve("Atlantis").await,
            Err(ResolveError::NoMatch("Atlantis".into()))
        );
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_live_without_curated_gets_generic_overlay() {
        let peru = ApiCountry {
            code: "PE".into(),
            name: "Peru".into(),
            region: "Americas".into(),
            subregion: "South America".into(),
            capital: "Lima".into(),
            population: Some(33_000_000),
            languages: vec!["Spanish".into(), "Quechua".into()],
            currencies: vec!["Peruvian sol".into()],
        };
        let (resolver, _) = resolver(FakeSource::with(vec![peru]));
        let resolved = resolver.resolve("peru").await.unwrap();

        assert!(!resolved.used_fallback);
        assert_eq!(resolved.safety.overall_risk, OverallRisk::Unknown);
        assert_eq!(resolved.safety.risk_scores, RiskScores::uniform(3));
        assert_eq!(resolved.safety.top_risks.len(), 2);
        assert!(resolved.safety.playbook.is_empty());
        assert_eq!(resolved.safety.code, "PE");
        assert_eq!(resolved.safety.region, "Americas");
    }

    #[tokio::test]
    async fn test_live_code_mismatch_falls_back_to_name() {
        let mut japan = france_api();
        japan.code = "XJ".into();
        japan.name = "Nippon".into();
        let (resolver, _) = resolver(FakeSource::with(vec![japan]));

        let resolved = resolver.resolve("Nippon").await.unwrap();
        assert_eq!(resolved.code, "XJ");
        assert_eq!(resolved.safety.code, "JP");
        assert!(!resolved.used_fallback);
    }

    #[tokio::test]
    async fn test_live_failure_uses_catalog_by_query() {
        let (resolver, _) = resolver(FakeSource::default());
        let resolved = resolver.resolve("  nihon ").await.unwrap();

        assert!(resolved.used_fallback);
        assert_eq!(resolved.code, "JP");
        assert_eq!(resolved.name, "Japan");
        assert_eq!(resolved.api.region, "Asia");
        assert_eq!(resolved.api.subregion, "");
        assert_eq!(resolved.api.capital, "N/A");
        assert_eq!(resolved.api.population, None);
        assert!(resolved.api.languages.is_empty());
        assert!(resolved.api.currencies.is_empty());
        assert_eq!(resolved.safety.playbook.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_catalog_degrades_to_generic() {
        let source = Arc::new(FakeSource::with(vec![france_api()]));
        let resolver = CountryResolver::new(source, CatalogHandle::ready(SafetyCatalog::new()));

        let resolved = resolver.resolve("France").await.unwrap();
        assert_eq!(resolved.safety.overall_risk, OverallRisk::Unknown);
        assert_eq!(resolver.resolve("Japan").await, Err(ResolveError::NoMatch("Japan".into())));
    }

    #[tokio::test]
    async fn test_resolving_twice_is_stable() {
        let (resolver, _) = resolver(FakeSource::with(vec![france_api()]));
        let first = resolver.resolve("France").await.unwrap();
        let second = resolver.resolve("France").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_waits_for_catalog() {
        let handle = CatalogHandle::pending();
        let resolver = CountryResolver::new(Arc::new(FakeSource::default()), handle.clone());

        let pending = tokio::spawn(async move { resolver.resolve("Japan").await });
        tokio::task::yield_now().await;
        handle.install(catalog());

        let resolved = pending.await.unwrap().unwrap();
        assert_eq!(resolved.code, "JP");
        assert!(resolved.used_fallback);
    }

    #[tokio::test]
    async fn test_dyn_source() {
        let source: Arc<dyn CountrySource> = Arc::new(FakeSource::with(vec![france_api()]));
        let resolver = CountryResolver::new(source, CatalogHandle::ready(catalog()));
        assert_eq!(resolver.resolve("france").await.unwrap().code, "FR");
    }
}
