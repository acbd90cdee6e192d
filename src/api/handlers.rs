//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::{CacheDiagnostics, NamedValueCache};
use crate::error::{CacheError, Result};
use crate::models::{
    CacheStatsResponse, EntityResponse, ExistsResponse, HealthResponse, InvalidateResponse,
    ResolveQuery,
};

/// Application state shared across all handlers.
///
/// Holds the served named-value cache plus every cache reported on by the
/// health and stats endpoints.
#[derive(Clone)]
pub struct AppState {
    /// Cache behind the entity endpoints
    pub named_values: Arc<NamedValueCache>,
    /// Caches listed by health and stats
    pub caches: Vec<Arc<dyn CacheDiagnostics>>,
}

impl AppState {
    /// Creates a new AppState serving the given cache.
    pub fn new(named_values: Arc<NamedValueCache>) -> Self {
        let diagnostics: Arc<dyn CacheDiagnostics> = named_values.clone();
        Self {
            named_values,
            caches: vec![diagnostics],
        }
    }

    /// Registers another cache for health and stats reporting.
    pub fn with_cache(mut self, cache: Arc<dyn CacheDiagnostics>) -> Self {
        self.caches.push(cache);
        self
    }
}

/// Parses a named-value id from the path.
fn parse_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::InvalidRequest(format!("'{}' is not a valid id", raw)))
}

/// Handler for GET /entities/:id
///
/// Resolves an entity for the requested locales, fetching what is missing.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<EntityResponse<String>>> {
    // Validate request
    if let Some(error_msg) = query.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let id = parse_id(&id)?;

    let cache = &state.named_values;
    let entity = cache
        .resolve(&id, &query.locales())
        .await?
        .ok_or_else(|| CacheError::Disposed(cache.name().to_string()))?;

    Ok(Json(EntityResponse::from(entity)))
}

/// Handler for GET /entities/:id/exists
///
/// Checks the store only; never fetches.
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExistsResponse>> {
    let parsed = parse_id(&id)?;
    let exists = state.named_values.contains(&parsed);

    Ok(Json(ExistsResponse::new(id, exists)))
}

/// Handler for DELETE /entities/:id
///
/// Drops the cached entity so the next resolve fetches it again.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    let parsed = parse_id(&id)?;
    let removed = state.named_values.invalidate(&parsed);

    Ok(Json(InvalidateResponse::new(id, removed)))
}

/// Handler for GET /stats
///
/// Returns store statistics of every registered cache.
pub async fn stats_handler(State(state): State<AppState>) -> Json<Vec<CacheStatsResponse>> {
    let stats = state
        .caches
        .iter()
        .map(|cache| CacheStatsResponse::new(cache.name(), &cache.stats(), cache.size()))
        .collect();

    Json(stats)
}

/// Handler for GET /health
///
/// Returns the health report of every registered cache.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let reports = state.caches.iter().map(|cache| cache.health()).collect();
    Json(HealthResponse::from_reports(reports))
}
