//! Current-country state for one front end

use crate::countries_api::CountrySource;
use crate::guidance::{compose_guidance, Guidance, GuidanceError};
use crate::resolver::CountryResolver;
use crate::{ResolveError, ResolvedCountry};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Holds the currently selected country
///
/// Searches are not cancelled or ordered against each other: whichever
/// finishes last decides the current country.
pub struct Session<S: ?Sized> {
    resolver: CountryResolver<S>,
    current: RwLock<Option<Arc<ResolvedCountry>>>,
}

impl<S: CountrySource + ?Sized> Session<S> {
    pub fn new(resolver: CountryResolver<S>) -> Self {
        Self {
            resolver,
            current: RwLock::new(None),
        }
    }

    pub fn resolver(&self) -> &CountryResolver<S> {
        &self.resolver
    }

    pub async fn current(&self) -> Option<Arc<ResolvedCountry>> {
        self.current.read().await.clone()
    }

    /// Resolve `query` and make it the current country
    ///
    /// `NoMatch` clears the selection; `EmptyQuery` leaves it untouched.
    pub async fn search(&self, query: &str) -> Result<Arc<ResolvedCountry>, ResolveError> {
        match self.resolver.resolve(query).await {
            Ok(resolved) => {
                let resolved = Arc::new(resolved);
                *self.current.write().await = Some(Arc::clone(&resolved));
                Ok(resolved)
            }
            Err(ResolveError::NoMatch(q)) => {
                debug!(query = %q, "No match, clearing current country");
                *self.current.write().await = None;
                Err(ResolveError::NoMatch(q))
            }
            Err(e) => Err(e),
        }
    }

    /// Guidance for `question` about the current country
    pub async fn ask(&self, question: &str) -> Result<Guidance, GuidanceError> {
        let current = self.current().await.ok_or(GuidanceError::NoCountrySelected)?;
        compose_guidance(&current, question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogHandle;
    use crate::resolver::testing::{catalog, france_api, FakeSource};
    use crate::ScenarioKey;

    fn session() -> Session<FakeSource> {
        let resolver = CountryResolver::new(
            Arc::new(FakeSource::with(vec![france_api()])),
            CatalogHandle::ready(catalog()),
        );
        Session::new(resolver)
    }

    #[tokio::test]
    async fn test_ask_without_country() {
        let session = session();
        assert_eq!(
            session.ask("I lost my passport").await,
            Err(GuidanceError::NoCountrySelected)
        );
    }

    #[tokio::test]
    async fn test_search_then_ask() {
        let session = session();
        session.search("France").await.unwrap();

        let guidance = session.ask("my passport is gone").await.unwrap();
        assert_eq!(guidance.scenario(), Some(ScenarioKey::LostPassport));
    }

    #[tokio::test]
    async fn test_last_search_wins() {
        let session = session();
        session.search("France").await.unwrap();
        session.search("Japan").await.unwrap();
        assert_eq!(session.current().await.unwrap().code, "JP");
    }

    #[tokio::test]
    async fn test_no_match_clears_but_empty_query_keeps() {
        let session = session();
        session.search("France").await.unwrap();

        assert_eq!(session.search("  ").await.unwrap_err(), ResolveError::EmptyQuery);
        assert_eq!(session.current().await.unwrap().code, "FR");

        assert!(matches!(
            session.search("Atlantis").await,
            Err(ResolveError::NoMatch(_))
        ));
        assert!(session.current().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_searches_leave_one_complete_country() {
        let session = Arc::new(session());
        let a = {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.search("France").await })
        };
        let b = {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.search("Japan").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let current = session.current().await.unwrap();
        assert!(current.code == "FR" || current.code == "JP");
        assert_eq!(current.code, current.safety.code);
    }
}
