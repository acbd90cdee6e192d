//! Localized Cache Module
//!
//! The public face of a reference-data cache: an expiring store of localized
//! entities, the coordinator filling it and the background tasks keeping it
//! warm and clean.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::coordinator::FetchCoordinator;
use crate::entity::{LocalizedEntity, Mergeable};
use crate::error::Result;
use crate::locale::Locale;
use crate::merge::{EntityStore, FetchedLocales};
use crate::payload::{Dto, NamedValueDto, VariantDescriptionDto};
use crate::source::DataSource;
use crate::store::{CacheStats, ExpiringStore};
use crate::tasks::{spawn_sweep_task, RefreshScheduler, SchedulerState};
use crate::validation::Validator;

/// Cache of named values (match statuses, void reasons, ...).
pub type NamedValueCache = LocalizedCache<NamedValueDto>;

/// Cache of variant market descriptions.
pub type VariantDescriptionCache = LocalizedCache<VariantDescriptionDto>;

// == Health Report ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Disposed,
}

/// Health of a single cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub cache: String,
    pub status: HealthStatus,
    pub item_count: usize,
    pub description: String,
}

// == Cache Diagnostics ==
/// Read-only view a diagnostics surface needs of any cache.
pub trait CacheDiagnostics: Send + Sync {
    fn name(&self) -> &str;
    fn count(&self) -> usize;
    fn size(&self) -> usize;
    fn stats(&self) -> CacheStats;
    fn health(&self) -> HealthReport;
}

// == Localized Cache ==
/// A locale-aware cache over one payload type.
///
/// Construction arms the refresh scheduler and the expiry sweep without
/// fetching anything; the first fetch happens after the configured due time
/// or on the first [`resolve`](Self::resolve) miss.
pub struct LocalizedCache<M: Mergeable> {
    config: CacheConfig,
    store: Arc<EntityStore<M>>,
    coordinator: Arc<FetchCoordinator<M>>,
    scheduler: RefreshScheduler<M>,
}

impl<M: Mergeable> LocalizedCache<M> {
    // == Constructor ==
    /// Builds the cache and starts its background tasks.
    ///
    /// Fails with `Construction` on an invalid config or outside a tokio runtime.
    pub fn new(
        config: CacheConfig,
        source: Arc<dyn DataSource<M>>,
        validator: Arc<dyn Validator<M>>,
    ) -> Result<Self> {
        config.validate()?;

        let policy = config.expiration_policy();
        let store = Arc::new(ExpiringStore::new(config.name.clone(), policy));
        let ledger = Arc::new(FetchedLocales::new(policy.min_lifetime()));
        let token = CancellationToken::new();

        let coordinator = Arc::new(FetchCoordinator::new(
            config.name.clone(),
            Arc::clone(&store),
            source,
            validator,
            ledger,
            config.strategy,
            config.prefetch_locales.clone(),
            token.clone(),
        ));

        let scheduler = RefreshScheduler::new(
            Arc::clone(&coordinator),
            config.prefetch_locales.clone(),
            config.refresh_due,
            config.refresh_period,
        );
        scheduler.start(&token)?;

        if !policy.is_eternal() {
            spawn_sweep_task(Arc::clone(&store), config.scan_interval, token.child_token());
        }

        info!(
            cache = %config.name,
            locales = ?config.prefetch_locales,
            strategy = %config.strategy,
            "cache created"
        );

        Ok(Self {
            config,
            store,
            coordinator,
            scheduler,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Resolve ==
    /// Returns the entity for `id` covering `locales` (the prefetch locales when empty).
    ///
    /// See [`FetchCoordinator::resolve`] for the strategy and disposal rules.
    pub async fn resolve(
        &self,
        id: &M::Id,
        locales: &[Locale],
    ) -> Result<Option<LocalizedEntity<M>>> {
        self.coordinator.resolve(id, locales).await
    }

    /// Returns true if a live entity for `id` is cached. Never fetches.
    pub fn contains(&self, id: &M::Id) -> bool {
        self.store.contains(id)
    }

    // == Invalidate ==
    /// Drops the cached entity for `id`; the next resolve fetches it again.
    ///
    /// Lists are fetched per locale, so the fetched-locale ledger is cleared too.
    pub fn invalidate(&self, id: &M::Id) -> bool {
        let removed = self.store.remove(id).is_some();
        if removed {
            self.coordinator.forget_fetched();
        }
        debug!(cache = %self.config.name, %id, removed, "invalidated entity");
        removed
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    /// Approximate footprint in bytes; 0 when the store is busy.
    pub fn size(&self) -> usize {
        self.store.size()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    // == Health ==
    pub fn health(&self) -> HealthReport {
        let item_count = self.store.count();
        let status = if self.coordinator.is_disposed() {
            HealthStatus::Disposed
        } else {
            HealthStatus::Healthy
        };
        HealthReport {
            cache: self.config.name.clone(),
            status,
            item_count,
            description: format!("Cache has {} items", item_count),
        }
    }

    // == Add Dto ==
    /// Merges a DTO pushed by another component.
    ///
    /// Returns false when the payload type does not accept this DTO kind or
    /// the cache is disposed.
    pub async fn add_dto(&self, locale: &Locale, dto: &Dto) -> bool {
        let Some(payloads) = M::from_dto(dto) else {
            debug!(
                cache = %self.config.name,
                kind = dto.kind(),
                "ignoring dto of unsupported kind"
            );
            return false;
        };

        match self.coordinator.push(locale, payloads).await {
            Ok(report) => {
                debug!(
                    cache = %self.config.name,
                    %locale,
                    merged = report.merged,
                    skipped = report.skipped,
                    "merged pushed dto"
                );
                true
            }
            Err(err) => {
                warn!(
                    cache = %self.config.name,
                    %locale,
                    error = %err,
                    "pushed dto was not merged"
                );
                false
            }
        }
    }

    // == Load All ==
    /// Forgets every fetched locale and fetches the prefetch set again.
    ///
    /// Returns true when every prefetch locale was fetched.
    pub async fn load_all(&self) -> bool {
        self.coordinator.forget_fetched();
        match self
            .coordinator
            .refresh(&self.config.prefetch_locales, true)
            .await
        {
            Ok(fetched) => fetched.len() == self.config.prefetch_locales.len(),
            Err(err) => {
                warn!(cache = %self.config.name, error = %err, "reloading the cache failed");
                false
            }
        }
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Stops the refresh timer; the cache keeps serving and fetching on misses.
    pub fn stop_refresh(&self) {
        self.scheduler.stop();
    }

    // == Dispose ==
    /// Tears the cache down. Later resolves return `Ok(None)`.
    pub fn dispose(&self) {
        if self.coordinator.is_disposed() {
            return;
        }
        self.scheduler.stop();
        self.coordinator.dispose();
        info!(cache = %self.config.name, "cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.coordinator.is_disposed()
    }

    /// The underlying entity store.
    pub fn store(&self) -> &Arc<EntityStore<M>> {
        &self.store
    }
}

impl<M: Mergeable> CacheDiagnostics for LocalizedCache<M> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn count(&self) -> usize {
        self.store.count()
    }

    fn size(&self) -> usize {
        self.store.size()
    }

    fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    fn health(&self) -> HealthReport {
        LocalizedCache::health(self)
    }
}

impl<M: Mergeable> Drop for LocalizedCache<M> {
    fn drop(&mut self) {
        self.dispose();
    }
}
