//! Error types for the reference-data cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::locale::Locale;
use crate::models::ErrorResponse;

// == Validation Error ==
/// A payload that is structurally inconsistent and cannot be merged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("payload '{id}' failed validation: {reason}")]
pub struct ValidationError {
    /// Identifier of the rejected payload
    pub id: String,
    /// What was wrong with it
    pub reason: String,
}

impl ValidationError {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A required constructor argument was missing or empty
    #[error("Invalid cache construction: {0}")]
    Construction(String),

    /// The data source could not be reached
    #[error("Fetching {resource} for locale '{locale}' failed: {message}")]
    Fetch {
        resource: String,
        locale: Locale,
        message: String,
    },

    /// The data source returned a malformed payload
    #[error("Malformed {resource} payload for locale '{locale}': {message}")]
    Deserialization {
        resource: String,
        locale: Locale,
        message: String,
    },

    /// A payload failed structural validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The id has no data upstream
    #[error("Item '{id}' not found in cache '{cache}'")]
    NotFound { cache: String, id: String },

    /// The cache was torn down while the operation was running
    #[error("Cache '{0}' is disposed")]
    Disposed(String),

    /// Invalid request data on the diagnostics surface
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    // == Classification ==
    /// Returns true for failures the scheduler and the Catch strategy recover from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CacheError::Fetch { .. }
                | CacheError::Deserialization { .. }
                | CacheError::Validation(_)
                | CacheError::NotFound { .. }
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound { .. } => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Construction(_) => StatusCode::BAD_REQUEST,
            CacheError::Fetch { .. } | CacheError::Deserialization { .. } => {
                StatusCode::BAD_GATEWAY
            }
            CacheError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::Disposed(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
