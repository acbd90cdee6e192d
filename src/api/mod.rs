//! API Module
//!
//! HTTP handlers and routing for the cache diagnostics API.
//!
//! # Endpoints
//! - `GET /health` - Health of every registered cache
//! - `GET /stats` - Store statistics per cache
//! - `GET /entities/:id?locales=en,de` - Resolve a named value
//! - `GET /entities/:id/exists` - Check whether a named value is cached
//! - `DELETE /entities/:id` - Invalidate a cached named value

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
