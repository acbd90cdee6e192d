//! Expiry Sweep Task
//!
//! Background task that periodically removes expired store entries.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::ExpiringStore;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// Expired entries are already invisible to reads; the sweep reclaims them
/// from enumeration and counts. The task ends when `token` is cancelled.
///
/// # Example
/// ```ignore
/// let store = Arc::new(ExpiringStore::new("names", ExpirationPolicy::sliding(ttl)));
/// let token = CancellationToken::new();
/// let handle = spawn_sweep_task(store.clone(), Duration::from_secs(60), token.clone());
/// // Later, during shutdown:
/// token.cancel();
/// ```
pub fn spawn_sweep_task<K, V>(
    store: Arc<ExpiringStore<K, V>>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            store = store.name(),
            "Starting expiry sweep task with interval of {:?}", interval
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(store = store.name(), "expiry sweep task stopped");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = store.sweep_expired();
            if removed > 0 {
                info!(store = store.name(), "Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!(store = store.name(), "Expiry sweep: no expired entries found");
            }
        }
    })
}
