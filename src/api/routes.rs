//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    exists_handler, health_handler, invalidate_handler, resolve_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check of every cache
/// - `GET /stats` - Store statistics per cache
/// - `GET /entities/:id` - Resolve an entity (`?locales=en,de`)
/// - `DELETE /entities/:id` - Invalidate an entity
/// - `GET /entities/:id/exists` - Check whether an entity is cached
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route(
            "/entities/:id",
            get(resolve_handler).delete(invalidate_handler),
        )
        .route("/entities/:id/exists", get(exists_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
