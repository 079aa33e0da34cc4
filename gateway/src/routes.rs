use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use country_safety::{
    compose_guidance, CountryBrief, Guidance, GuidanceError, ResolveError, ResolvedCountry,
    SafetyCatalog,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            message: message.into(),
        }),
    )
}

impl From<ResolveError> for ErrorResponse {
    fn from(e: ResolveError) -> Self {
        let error = match e {
            ResolveError::EmptyQuery => "empty_query",
            ResolveError::NoMatch(_) => "no_match",
        };
        Self {
            error,
            message: e.to_string(),
        }
    }
}

fn resolve_error(e: ResolveError) -> ApiError {
    let status = match e {
        ResolveError::EmptyQuery => StatusCode::BAD_REQUEST,
        ResolveError::NoMatch(_) => StatusCode::NOT_FOUND,
    };
    (status, Json(e.into()))
}

fn guidance_error(e: GuidanceError) -> ApiError {
    let error = match e {
        GuidanceError::NoCountrySelected => "no_country",
        GuidanceError::EmptyQuestion => "empty_question",
    };
    api_error(StatusCode::BAD_REQUEST, error, e.to_string())
}

#[derive(Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub country: ResolvedCountry,
    pub brief: CountryBrief,
}

#[derive(Deserialize)]
pub struct GuidanceRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub question: String,
}

#[derive(Serialize)]
pub struct GuidanceResponse {
    pub code: String,
    pub name: String,
    pub used_fallback: bool,
    pub guidance: Guidance,
}

#[derive(Serialize)]
pub struct CatalogSummary {
    pub countries: usize,
    pub core_countries: usize,
}

impl From<&SafetyCatalog> for CatalogSummary {
    fn from(catalog: &SafetyCatalog) -> Self {
        Self {
            countries: catalog.len(),
            core_countries: catalog.core_count(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/countries/resolve", get(resolve_country))
        .route("/guidance", post(ask_guidance))
        .route("/catalog", get(catalog_summary))
        .route("/catalog/reload", post(reload_catalog))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "safety-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Resolve a country and render its brief
pub async fn resolve_country(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let country = state.resolver.resolve(&query.q).await.map_err(resolve_error)?;
    let brief = CountryBrief::from_resolved(&country);
    Ok(Json(ResolveResponse { country, brief }))
}

/// Answer a question about a country
///
/// The question is checked before the country is looked up.
pub async fn ask_guidance(
    State(state): State<AppState>,
    Json(req): Json<GuidanceRequest>,
) -> Result<Json<GuidanceResponse>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(guidance_error(GuidanceError::EmptyQuestion));
    }

    let country = state.resolver.resolve(&req.query).await.map_err(resolve_error)?;
    let guidance = compose_guidance(&country, &req.question).map_err(guidance_error)?;

    Ok(Json(GuidanceResponse {
        name: country.display_name().to_string(),
        code: country.code,
        used_fallback: country.used_fallback,
        guidance,
    }))
}

pub async fn catalog_summary(State(state): State<AppState>) -> Json<CatalogSummary> {
    let catalog = state.catalog().snapshot().await;
    Json(CatalogSummary::from(catalog.as_ref()))
}

/// Reload the dataset wholesale
///
/// A failed reload keeps the catalog that is already installed.
pub async fn reload_catalog(
    State(state): State<AppState>,
) -> Result<Json<CatalogSummary>, ApiError> {
    let mut catalog = SafetyCatalog::new();
    catalog
        .load(&state.catalog_source, state.catalog().fetch_timeout())
        .await
        .map_err(|e| {
            tracing::error!("Catalog reload from {} failed: {}", state.catalog_source, e);
            api_error(StatusCode::BAD_GATEWAY, "reload_failed", e.to_string())
        })?;

    let summary = CatalogSummary::from(&catalog);
    state.catalog().install(catalog);
    tracing::info!("Reloaded {} safety records", summary.countries);
    Ok(Json(summary))
}
