//! Background Tasks Module
//!
//! Tasks that run periodically for the lifetime of a cache.
//!
//! # Tasks
//! - Expiry sweep: removes expired store entries at the scan interval
//! - Refresh scheduler: keeps the prefetch locales warm

mod refresh;
mod sweep;

pub use refresh::{RefreshScheduler, SchedulerState};
pub use sweep::spawn_sweep_task;
