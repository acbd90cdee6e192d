//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::{HealthReport, HealthStatus};
use crate::entity::{LocalizedEntity, Mergeable};
use crate::locale::Locale;
use crate::store::CacheStats;

/// Response body of the resolve endpoint (GET /entities/:id)
#[derive(Debug, Clone, Serialize)]
pub struct EntityResponse<T> {
    /// Entity id
    pub id: String,
    /// Localized payload per locale
    pub values: BTreeMap<Locale, T>,
    /// Locales merged into the entity, with or without a value
    pub fetched_locales: Vec<Locale>,
    /// True when no locale carries a value
    pub shell: bool,
}

impl<M: Mergeable> From<LocalizedEntity<M>> for EntityResponse<M::Localized> {
    fn from(entity: LocalizedEntity<M>) -> Self {
        Self {
            id: entity.id().to_string(),
            values: entity.values().clone(),
            fetched_locales: entity.fetched_locales().iter().cloned().collect(),
            shell: entity.is_shell(),
        }
    }
}

/// Response body of the exists endpoint (GET /entities/:id/exists)
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub id: String,
    pub exists: bool,
}

impl ExistsResponse {
    pub fn new(id: impl Into<String>, exists: bool) -> Self {
        Self {
            id: id.into(),
            exists,
        }
    }
}

/// Response body of the invalidate endpoint (DELETE /entities/:id)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Outcome message
    pub message: String,
    /// The invalidated id
    pub id: String,
    /// Whether a cached entity was dropped
    pub removed: bool,
}

impl InvalidateResponse {
    /// Creates a new InvalidateResponse
    pub fn new(id: impl Into<String>, removed: bool) -> Self {
        let id = id.into();
        let message = if removed {
            format!("Entity '{}' invalidated", id)
        } else {
            format!("Entity '{}' was not cached", id)
        };
        Self {
            message,
            id,
            removed,
        }
    }
}

/// One cache's entry in the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    /// Cache name
    pub cache: String,
    /// Number of store hits
    pub hits: u64,
    /// Number of store misses
    pub misses: u64,
    /// Number of inserts
    pub inserts: u64,
    /// Number of explicit removals
    pub removals: u64,
    /// Number of entries dropped on expiry
    pub expirations: u64,
    /// Current number of live entries
    pub total_entries: usize,
    /// Approximate footprint in bytes
    pub size_bytes: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl CacheStatsResponse {
    /// Creates a new CacheStatsResponse from store statistics
    pub fn new(cache: impl Into<String>, stats: &CacheStats, size_bytes: usize) -> Self {
        Self {
            cache: cache.into(),
            hits: stats.hits,
            misses: stats.misses,
            inserts: stats.inserts,
            removals: stats.removals,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            size_bytes,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" when every cache is, "degraded" otherwise
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Per-cache reports
    pub caches: Vec<HealthReport>,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn from_reports(caches: Vec<HealthReport>) -> Self {
        let healthy = caches
            .iter()
            .all(|report| report.status == HealthStatus::Healthy);
        Self {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            caches,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
