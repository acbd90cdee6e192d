//! Refcache - Locale-aware reference-data caches
//!
//! Keeps rarely changing, per-locale descriptive entities close to the
//! caller: concurrent lookups share fetches, partial locale results are
//! merged into one entity, entries expire with jittered TTLs and a
//! background timer keeps the configured locales warm.

pub mod api;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod locale;
pub mod merge;
pub mod models;
pub mod payload;
pub mod source;
pub mod store;
pub mod tasks;
pub mod validation;

pub use api::AppState;
pub use cache::{
    CacheDiagnostics, HealthReport, HealthStatus, LocalizedCache, NamedValueCache,
    VariantDescriptionCache,
};
pub use config::{CacheConfig, Config, ExceptionStrategy};
pub use entity::{LocalizedEntity, Mergeable};
pub use error::{CacheError, Result, ValidationError};
pub use locale::Locale;
pub use source::{DataSource, FileDataSource};
pub use tasks::SchedulerState;
pub use validation::{AcceptAll, Validator};
