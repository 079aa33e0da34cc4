//! Curated safety dataset: loading, lookup and shared handle

use crate::SafetyRecord;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Default timeout for fetching a dataset over HTTP
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Dataset fetch failed: {0}")]
    Http(String),
    #[error("Dataset must be a JSON object keyed by country code")]
    NotAnObject,
}

/// Where the safety dataset lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Path(PathBuf),
    Url(String),
}

impl CatalogSource {
    /// `http://` and `https://` locations are URLs, everything else a path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Url(u) => f.write_str(u),
        }
    }
}

/// In-memory code → record table
///
/// Iteration order is the order of the source document, which is also the
/// tie-break order for name lookups.
#[derive(Debug, Clone, Default)]
pub struct SafetyCatalog {
    records: Vec<SafetyRecord>,
    by_code: HashMap<String, usize>,
}

impl SafetyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records in order; a repeated code replaces the earlier
    /// record in place
    pub fn from_records(records: impl IntoIterator<Item = SafetyRecord>) -> Self {
        let mut catalog = Self::default();
        for record in records {
            match catalog.by_code.get(&record.code) {
                Some(&idx) => catalog.records[idx] = record,
                None => {
                    catalog.by_code.insert(record.code.clone(), catalog.records.len());
                    catalog.records.push(record);
                }
            }
        }
        catalog
    }

    /// Parse a dataset document: a JSON object mapping code → record
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        Self::from_json_value(value)
    }

    fn from_json_value(value: serde_json::Value) -> Result<Self, CatalogError> {
        let serde_json::Value::Object(entries) = value else {
            return Err(CatalogError::NotAnObject);
        };

        let mut records = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            let mut record: SafetyRecord = serde_json::from_value(entry)?;
            if record.code.is_empty() {
                record.code = key.clone();
            }
            if record.code != key {
                debug!(key = %key, code = %record.code, "Dataset key differs from record code; keying by dataset key");
                record.code = key;
            }
            records.push(record);
        }

        Ok(Self::from_records(records))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        info!("Loading safety dataset from {:?}", path);
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Fetch the dataset, giving up after `timeout`
    pub async fn from_url(url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        info!("Fetching safety dataset from {}", url);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Http(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Http(format!(
                "{} returned status: {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;
        Self::from_json_str(&body)
    }

    /// Replace the whole table from `source`
    ///
    /// On failure the table is left empty and the error returned; callers
    /// log it and carry on with zero entries.
    pub async fn load(
        &mut self,
        source: &CatalogSource,
        timeout: Duration,
    ) -> Result<(), CatalogError> {
        let loaded = match source {
            CatalogSource::Path(path) => Self::from_path(path),
            CatalogSource::Url(url) => Self::from_url(url, timeout).await,
        };

        match loaded {
            Ok(catalog) => {
                *self = catalog;
                info!("Loaded safety data: {} countries", self.len());
                Ok(())
            }
            Err(e) => {
                *self = Self::default();
                Err(e)
            }
        }
    }

    pub fn get_by_code(&self, code: &str) -> Option<&SafetyRecord> {
        self.by_code.get(code).map(|&idx| &self.records[idx])
    }

    /// Case-insensitive exact match on name or any alternate name; first
    /// record in catalog order wins
    pub fn find_by_name(&self, name: &str) -> Option<&SafetyRecord> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.records.iter().find(|r| r.matches_name(name))
    }

    pub fn is_core_country(&self, code: &str) -> bool {
        self.get_by_code(code).is_some_and(|r| r.is_core_country)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn core_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_core_country).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SafetyRecord> {
        self.records.iter()
    }
}

/// Shared, swappable catalog with readiness
///
/// Readers calling [`CatalogHandle::snapshot`] before the first install wait
/// for it; afterwards every install replaces the catalog as a whole.
#[derive(Clone)]
pub struct CatalogHandle {
    tx: Arc<watch::Sender<Option<Arc<SafetyCatalog>>>>,
    fetch_timeout: Duration,
}

impl CatalogHandle {
    /// Handle with no catalog yet; snapshots wait for the first install
    pub fn pending() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    /// Timeout applied by [`CatalogHandle::load_from`] to URL sources
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Handle that is ready immediately
    pub fn ready(catalog: SafetyCatalog) -> Self {
        let handle = Self::pending();
        handle.install(catalog);
        handle
    }

    pub fn install(&self, catalog: SafetyCatalog) {
        self.tx.send_replace(Some(Arc::new(catalog)));
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Current catalog without waiting
    pub fn try_snapshot(&self) -> Option<Arc<SafetyCatalog>> {
        self.tx.borrow().clone()
    }

    /// Current catalog, waiting for the first install if necessary
    pub async fn snapshot(&self) -> Arc<SafetyCatalog> {
        let mut rx = self.tx.subscribe();
        // The `watch::Ref` must drop before `rx` does.
        let current = match rx.wait_for(Option::is_some).await {
            Ok(current) => current.as_ref().map(Arc::clone).unwrap_or_default(),
            Err(_) => Arc::default(),
        };
        current
    }

    /// Load from `source` and install the result
    ///
    /// A failed load installs an empty catalog, so waiting readers are
    /// released either way.
    pub async fn load_from(&self, source: &CatalogSource) -> Result<usize, CatalogError> {
        let mut catalog = SafetyCatalog::new();
        let result = catalog.load(source, self.fetch_timeout).await;
        let count = catalog.len();
        self.install(catalog);

        match result {
            Ok(()) => Ok(count),
            Err(e) => {
                error!("Error loading safety dataset from {}: {}", source, e);
                Err(e)
            }
        }
    }
}

impl Default for CatalogHandle {
    fn default() -> Self {
        Self::pending()
    }
}
