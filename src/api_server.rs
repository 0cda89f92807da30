// Axum API server
//
// Endpoints:
//   GET  /health               liveness + current data generation
//   GET  /itree_codes.json     i-Tree codes with curve data, per region
//   GET  /eco.json             benefits for one tree (otmcode, diameter, region)
//   POST /eco_summary.json     summed benefits for a list of trees
//   POST /eco_scenario.json    per-tree benefits plus the total
//   GET  /invalidate_cache     reload species map and curves from disk

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::aggregate::{Accumulation, BenefitResults, TreeBatch, TreeRecord};
use crate::cache::{EcoCache, Generation};
use crate::config::Config;
use crate::error::{EcoError, EcoResult};

// ============================================================================
// Application State
// ============================================================================

type InvalidateFn = Arc<dyn Fn() -> EcoResult<u64> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<EcoCache>,
    invalidate: InvalidateFn,
    /// Single-tree responses keyed by generation + query
    pub responses: Cache<String, serde_json::Value>,
}

impl AppState {
    /// Build state around an empty cache; data loads on first use
    pub fn new(config: &Config) -> Self {
        let (cache, invalidate) = EcoCache::init(config);

        tracing::info!(
            "Initializing Moka response cache (capacity {}, ttl {}s)...",
            config.response_cache_capacity,
            config.response_cache_ttl_secs
        );
        let responses = Cache::builder()
            .max_capacity(config.response_cache_capacity)
            .time_to_live(Duration::from_secs(config.response_cache_ttl_secs))
            .build();

        Self {
            cache,
            invalidate: Arc::new(invalidate),
            responses,
        }
    }

    /// Reload benefit data and drop every cached response
    pub async fn reload(&self) -> Result<u64, AppError> {
        let invalidate = Arc::clone(&self.invalidate);
        let id = tokio::task::spawn_blocking(move || invalidate())
            .await
            .map_err(|e| AppError::Internal(format!("Reload task failed: {}", e)))??;

        self.responses.invalidate_all();
        Ok(id)
    }

    /// Current generation; the first call loads from disk on the blocking pool
    async fn generation(&self) -> Result<Arc<Generation>, AppError> {
        if let Some(generation) = self.cache.current() {
            return Ok(generation);
        }
        let cache = Arc::clone(&self.cache);
        let generation = tokio::task::spawn_blocking(move || cache.snapshot())
            .await
            .map_err(|e| AppError::Internal(format!("Load task failed: {}", e)))??;
        Ok(generation)
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/itree_codes.json", get(itree_codes))
        .route("/eco.json", get(eco_single))
        .route("/eco_summary.json", post(eco_summary))
        .route("/eco_scenario.json", post(eco_scenario))
        .route("/invalidate_cache", get(invalidate_cache))
        // Middleware (applied in reverse order)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "generation": state.cache.current().map(|g| g.id()),
    }))
}

async fn itree_codes(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let generation = state.generation().await?;
    Ok(Json(serde_json::json!({ "codes": generation.itree_codes() })))
}

async fn eco_single(
    State(state): State<AppState>,
    Query(query): Query<EcoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_diameter(query.diameter)?;
    let generation = state.generation().await?;

    let cache_key = format!(
        "eco:{}:{}:{}:{}",
        generation.id(),
        query.region,
        query.otmcode,
        query.diameter
    );
    if let Some(cached) = state.responses.get(&cache_key).await {
        tracing::debug!("Cache hit for {}", cache_key);
        return Ok(Json(cached));
    }

    let mut batch = TreeBatch::new(vec![TreeRecord::new(
        query.otmcode,
        query.diameter,
        query.region,
    )]);
    let results = generation.calc_benefits(&mut batch, 0, Accumulation::Summary)?;

    let result = serde_json::json!({ "benefits": results.total });
    state.responses.insert(cache_key, result.clone()).await;

    Ok(Json(result))
}

async fn eco_summary(
    State(state): State<AppState>,
    Json(req): Json<BenefitsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let results = run_batch(&state, req, Accumulation::Summary).await?;

    let mut body = serde_json::json!({ "benefits": results.total });
    if !results.by_region.is_empty() {
        body["regions"] = serde_json::json!(results.by_region);
    }
    Ok(Json(body))
}

async fn eco_scenario(
    State(state): State<AppState>,
    Json(req): Json<BenefitsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let results = run_batch(&state, req, Accumulation::PerTree).await?;

    let mut body = serde_json::json!({
        "trees": results.per_tree,
        "total": results.total,
    });
    if !results.by_region.is_empty() {
        body["regions"] = serde_json::json!(results.by_region);
    }
    Ok(Json(body))
}

async fn invalidate_cache(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let id = state.reload().await?;
    tracing::info!("Cache invalidated, serving generation {}", id);

    Ok(Json(serde_json::json!({
        "status": "reloaded",
        "generation": id,
    })))
}

/// Validate a request, then run the batch on the blocking pool
async fn run_batch(
    state: &AppState,
    req: BenefitsRequest,
    accumulation: Accumulation,
) -> Result<BenefitResults, AppError> {
    let records = req.into_records()?;
    let generation = state.generation().await?;

    let start = std::time::Instant::now();
    let tree_count = records.len();

    let results = tokio::task::spawn_blocking(move || {
        let mut batch = TreeBatch::new(records);
        generation.calc_benefits(&mut batch, 0, accumulation)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Benefit task failed: {}", e)))??;

    tracing::debug!("Computed {:?} for {} trees in {:?}", accumulation, tree_count, start.elapsed());

    Ok(results)
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize, Debug)]
struct EcoQuery {
    otmcode: String,
    diameter: f64,
    region: String,
}

#[derive(Deserialize, Debug)]
struct BenefitsRequest {
    /// Default region for trees that do not name one
    region: Option<String>,
    trees: Vec<TreeInput>,
}

#[derive(Deserialize, Debug)]
struct TreeInput {
    otmcode: String,
    diameter: f64,
    region: Option<String>,
}

impl BenefitsRequest {
    fn into_records(self) -> Result<Vec<TreeRecord>, AppError> {
        let default_region = self.region;

        self.trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| {
                check_diameter(tree.diameter)?;
                let region = tree
                    .region
                    .or_else(|| default_region.clone())
                    .ok_or_else(|| AppError::BadRequest(format!("Tree {} has no region", i)))?;
                Ok(TreeRecord::new(tree.otmcode, tree.diameter, region))
            })
            .collect()
    }
}

fn check_diameter(diameter: f64) -> Result<(), AppError> {
    if diameter.is_finite() && diameter >= 0.0 {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid diameter: {}", diameter)))
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<EcoError> for AppError {
    fn from(err: EcoError) -> Self {
        let message = err.to_string();
        match err {
            EcoError::UnknownSpecies { .. } => AppError::BadRequest(message),
            EcoError::UnknownRegion(_) | EcoError::RegionNotLoaded(_) => AppError::NotFound(message),
            EcoError::Load(_) => AppError::Unavailable(message),
            EcoError::Config(_) | EcoError::FactorMismatch { .. } => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_records_uses_default_region() {
        let req: BenefitsRequest = serde_json::from_value(serde_json::json!({
            "region": "NoEastXXX",
            "trees": [
                { "otmcode": "ACRU", "diameter": 10.0 },
                { "otmcode": "ULAM", "diameter": 4.5, "region": "LoMidWXXX" }
            ]
        }))
        .unwrap();

        let records = req.into_records().unwrap();
        assert_eq!(records[0], TreeRecord::new("ACRU", 10.0, "NoEastXXX"));
        assert_eq!(records[1], TreeRecord::new("ULAM", 4.5, "LoMidWXXX"));
    }

    #[test]
    fn test_into_records_requires_region() {
        let req: BenefitsRequest = serde_json::from_value(serde_json::json!({
            "trees": [{ "otmcode": "ACRU", "diameter": 10.0 }]
        }))
        .unwrap();

        assert!(matches!(req.into_records(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_check_diameter() {
        assert!(check_diameter(0.0).is_ok());
        assert!(check_diameter(25.4).is_ok());
        assert!(check_diameter(-1.0).is_err());
        assert!(check_diameter(f64::NAN).is_err());
        assert!(check_diameter(f64::INFINITY).is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        let species = AppError::from(EcoError::UnknownSpecies {
            region: "R".into(),
            code: "C".into(),
        });
        assert_eq!(species.into_response().status(), StatusCode::BAD_REQUEST);

        let region = AppError::from(EcoError::RegionNotLoaded("R".into()));
        assert_eq!(region.into_response().status(), StatusCode::NOT_FOUND);

        let load = AppError::from(EcoError::Load(anyhow::anyhow!("missing species.json")));
        assert_eq!(load.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
