//! Merge Pipeline Module
//!
//! Folds freshly fetched per-locale payloads into cached entities under the
//! write gate, validating each item on the way.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::entity::{LocalizedEntity, Mergeable};
use crate::error::{CacheError, Result};
use crate::locale::Locale;
use crate::store::ExpiringStore;
use crate::validation::Validator;

/// Store holding the entities of one cache.
pub type EntityStore<M> = ExpiringStore<<M as Mergeable>::Id, LocalizedEntity<M>>;

// == Fetched Locales ==
/// Ledger of locales whose full payload list was merged.
///
/// Shared by the coordinator (to skip locales another caller just finished)
/// and the refresh scheduler (to find locales never fetched). A record goes
/// stale after `freshness`, so ids whose entries expired are fetched again.
#[derive(Debug, Default)]
pub struct FetchedLocales {
    locales: Mutex<BTreeMap<Locale, Instant>>,
    freshness: Option<Duration>,
}

impl FetchedLocales {
    /// Creates a ledger whose records stay valid for `freshness`; None keeps them forever.
    pub fn new(freshness: Option<Duration>) -> Self {
        Self {
            locales: Mutex::new(BTreeMap::new()),
            freshness,
        }
    }

    pub fn record(&self, locale: Locale) {
        self.record_at(locale, Instant::now());
    }

    /// Records a locale as fetched at `at`; the record goes stale `freshness` later.
    pub fn record_at(&self, locale: Locale, at: Instant) {
        self.locales.lock().insert(locale, at);
    }

    pub fn contains(&self, locale: &Locale) -> bool {
        self.locales
            .lock()
            .get(locale)
            .map_or(false, |at| self.is_fresh(*at))
    }

    /// Returns the locales with a fresh record.
    pub fn snapshot(&self) -> BTreeSet<Locale> {
        self.locales
            .lock()
            .iter()
            .filter(|(_, at)| self.is_fresh(**at))
            .map(|(locale, _)| locale.clone())
            .collect()
    }

    /// Forgets the given locales so they are fetched again.
    pub fn forget<'a>(&self, locales: impl IntoIterator<Item = &'a Locale>) {
        let mut guard = self.locales.lock();
        for locale in locales {
            guard.remove(locale);
        }
    }

    pub fn clear(&self) {
        self.locales.lock().clear();
    }

    fn is_fresh(&self, recorded_at: Instant) -> bool {
        self.freshness
            .map_or(true, |freshness| recorded_at.elapsed() < freshness)
    }
}

// == Merge Report ==
/// Outcome of merging one locale's batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Items written into the store
    pub merged: usize,
    /// Items rejected by validation
    pub skipped: usize,
}

// == Merge Pipeline ==
/// Writes payloads into the entity store one batch at a time.
pub struct MergePipeline<M: Mergeable> {
    cache_name: String,
    store: Arc<EntityStore<M>>,
    validator: Arc<dyn Validator<M>>,
    ledger: Arc<FetchedLocales>,
    /// Serializes commits; closed on disposal
    write_gate: Semaphore,
    disposed: CancellationToken,
}

impl<M: Mergeable> MergePipeline<M> {
    pub fn new(
        cache_name: impl Into<String>,
        store: Arc<EntityStore<M>>,
        validator: Arc<dyn Validator<M>>,
        ledger: Arc<FetchedLocales>,
        disposed: CancellationToken,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            store,
            validator,
            ledger,
            write_gate: Semaphore::new(1),
            disposed,
        }
    }

    // == Merge ==
    /// Merges one locale's payloads into the store.
    ///
    /// An item failing validation is logged and skipped; its entity does not
    /// get the locale marked fetched. The locale is recorded in the ledger
    /// once the batch is done, stamped with the time the batch started so the
    /// record never outlives an entity the batch wrote.
    pub async fn merge(&self, locale: &Locale, payloads: Vec<M>) -> Result<MergeReport> {
        let started = Instant::now();
        let report = self.apply(locale, payloads).await?;
        self.ledger.record_at(locale.clone(), started);
        Ok(report)
    }

    /// Merges payloads pushed from outside the fetch path.
    ///
    /// A pushed batch may be partial, so the ledger is left alone.
    pub async fn merge_pushed(&self, locale: &Locale, payloads: Vec<M>) -> Result<MergeReport> {
        self.apply(locale, payloads).await
    }

    async fn apply(&self, locale: &Locale, payloads: Vec<M>) -> Result<MergeReport> {
        let _permit = self
            .write_gate
            .acquire()
            .await
            .map_err(|_| CacheError::Disposed(self.cache_name.clone()))?;
        if self.disposed.is_cancelled() {
            return Err(CacheError::Disposed(self.cache_name.clone()));
        }

        let mut report = MergeReport::default();
        for payload in payloads {
            if let Err(err) = self.validator.validate(&payload) {
                warn!(
                    cache = %self.cache_name,
                    %locale,
                    error = %err,
                    "skipping payload that failed validation"
                );
                report.skipped += 1;
                continue;
            }
            self.commit(locale, payload);
            report.merged += 1;
        }

        debug!(
            cache = %self.cache_name,
            %locale,
            merged = report.merged,
            skipped = report.skipped,
            "merged locale batch"
        );
        Ok(report)
    }

    fn commit(&self, locale: &Locale, payload: M) {
        let id = payload.id();
        let mut value = Some(payload.into_localized());

        let updated = self.store.update(&id, |entity| {
            if let Some(value) = value.take() {
                entity.merge(locale.clone(), value);
            }
        });
        if !updated {
            if let Some(value) = value {
                let entity = LocalizedEntity::seeded(id.clone(), locale.clone(), value);
                self.store.insert(id, entity);
            }
        }
    }

    /// Closes the write gate; pending and future merges fail with `Disposed`.
    pub fn close(&self) {
        self.write_gate.close();
    }
}
