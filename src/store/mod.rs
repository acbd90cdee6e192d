//! Store Module
//!
//! Provides the in-memory expiring store every cache builds on.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::{jitter_factor, CacheEntry, ExpirationPolicy};
pub use stats::CacheStats;
pub use store::ExpiringStore;
