use anyhow::Result;
use country_safety::catalog::DEFAULT_FETCH_TIMEOUT_SECS;
use country_safety::{
    CatalogHandle, CatalogSource, CountryResolver, CountrySource, RestCountriesClient,
    RestCountriesConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<CountryResolver<dyn CountrySource>>,
    pub catalog_source: Arc<CatalogSource>,
}

impl AppState {
    pub fn new(source: Arc<dyn CountrySource>, catalog: CatalogHandle, catalog_source: CatalogSource) -> Self {
        Self {
            resolver: Arc::new(CountryResolver::new(source, catalog)),
            catalog_source: Arc::new(catalog_source),
        }
    }

    pub fn catalog(&self) -> &CatalogHandle {
        self.resolver.catalog()
    }
}

fn rest_countries_config() -> RestCountriesConfig {
    let defaults = RestCountriesConfig::default();
    RestCountriesConfig {
        base_url: std::env::var("REST_COUNTRIES_URL").unwrap_or(defaults.base_url),
        timeout_sec: std::env::var("REST_COUNTRIES_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout_sec),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "safety_gateway=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let dataset = std::env::var("SAFETY_DATASET")
        .unwrap_or_else(|_| "data/country_safety.json".to_string());
    let catalog_source = CatalogSource::parse(&dataset);

    let client = RestCountriesClient::new(rest_countries_config())?;
    tracing::info!("   REST Countries at {}", client.config().base_url);

    let dataset_timeout = std::env::var("SAFETY_DATASET_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    let catalog = CatalogHandle::pending().with_fetch_timeout(Duration::from_secs(dataset_timeout));

    let state = AppState::new(Arc::new(client), catalog, catalog_source);

    // Requests arriving before this finishes wait on the handle.
    {
        let state = state.clone();
        tokio::spawn(async move {
            if let Ok(count) = state.catalog().load_from(&state.catalog_source).await {
                tracing::info!("   Loaded {} safety records from {}", count, state.catalog_source);
            }
        });
    }

    let api_routes = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Static file serving for UI (if dist exists)
    let ui_dir = std::env::var("SAFETY_UI_DIR").unwrap_or_else(|_| "ui/dist".to_string());
    let ui_path = std::path::Path::new(&ui_dir);
    let app = if ui_path.exists() {
        tracing::info!("   Serving UI from {}", ui_path.display());
        api_routes.fallback_service(ServeDir::new(ui_path))
    } else {
        tracing::warn!("   UI not built at {}", ui_path.display());
        api_routes
    };

    let port = std::env::var("SAFETY_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "18700".to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("Safety Gateway starting on {}", addr);
    tracing::info!("   Dataset: {}", dataset);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
