//! Fetch Coordinator Module
//!
//! Resolves entities by id and locale set, fetching only what is missing and
//! never fetching a locale twice for concurrent callers.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExceptionStrategy;
use crate::entity::{LocalizedEntity, Mergeable};
use crate::error::{CacheError, Result};
use crate::locale::Locale;
use crate::merge::{EntityStore, FetchedLocales, MergePipeline, MergeReport};
use crate::source::DataSource;
use crate::validation::Validator;

// == Fetch Coordinator ==
/// Decides what to fetch for a cache and drives fetches through the merge pipeline.
///
/// Two independent gates: the decide gate admits one "what is missing"
/// decision at a time, the write gate inside [`MergePipeline`] serializes
/// commits. Reads that are already covered take neither.
pub struct FetchCoordinator<M: Mergeable> {
    name: String,
    store: Arc<EntityStore<M>>,
    source: Arc<dyn DataSource<M>>,
    merger: MergePipeline<M>,
    ledger: Arc<FetchedLocales>,
    decide_gate: Semaphore,
    strategy: ExceptionStrategy,
    default_locales: Vec<Locale>,
    disposed: CancellationToken,
}

impl<M: Mergeable> FetchCoordinator<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        store: Arc<EntityStore<M>>,
        source: Arc<dyn DataSource<M>>,
        validator: Arc<dyn Validator<M>>,
        ledger: Arc<FetchedLocales>,
        strategy: ExceptionStrategy,
        default_locales: Vec<Locale>,
        disposed: CancellationToken,
    ) -> Self {
        let name = name.into();
        let merger = MergePipeline::new(
            name.clone(),
            Arc::clone(&store),
            validator,
            Arc::clone(&ledger),
            disposed.clone(),
        );
        Self {
            name,
            store,
            source,
            merger,
            ledger,
            decide_gate: Semaphore::new(1),
            strategy,
            default_locales,
            disposed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> ExceptionStrategy {
        self.strategy
    }

    /// Locales used when a caller asks for none.
    pub fn default_locales(&self) -> &[Locale] {
        &self.default_locales
    }

    // == Resolve ==
    /// Returns the entity for `id` covering `locales`.
    ///
    /// An empty `locales` slice means the default locales. Returns `Ok(None)`
    /// once the coordinator is disposed. Under [`ExceptionStrategy::Catch`]
    /// an id upstream does not know resolves to a shell entity, which is not
    /// stored.
    pub async fn resolve(
        &self,
        id: &M::Id,
        locales: &[Locale],
    ) -> Result<Option<LocalizedEntity<M>>> {
        if self.disposed.is_cancelled() {
            warn!(cache = %self.name, %id, "resolve called on a disposed cache");
            return Ok(None);
        }

        let wanted: BTreeSet<Locale> = if locales.is_empty() {
            self.default_locales.iter().cloned().collect()
        } else {
            locales.iter().cloned().collect()
        };

        // Fast path, no gate
        if let Some(entity) = self.store.get(id) {
            if entity.covers(&wanted) {
                return Ok(Some(entity));
            }
        }

        match self.fetch_missing(id, &wanted).await {
            Ok(()) => {}
            Err(CacheError::Disposed(_)) => {
                debug!(cache = %self.name, %id, "cache disposed while resolving");
                return Ok(None);
            }
            Err(err) => match self.strategy {
                ExceptionStrategy::Throw => return Err(err),
                ExceptionStrategy::Catch => {
                    warn!(
                        cache = %self.name,
                        %id,
                        error = %err,
                        "fetch failed, resolving best effort"
                    );
                }
            },
        }

        match self.store.get(id) {
            Some(entity) if entity.covers(&wanted) => Ok(Some(entity)),
            existing => match self.strategy {
                ExceptionStrategy::Throw => Err(CacheError::NotFound {
                    cache: self.name.clone(),
                    id: id.to_string(),
                }),
                ExceptionStrategy::Catch => {
                    let mut shell = existing.unwrap_or_else(|| LocalizedEntity::new(id.clone()));
                    shell.mark_fetched(&wanted);
                    debug!(cache = %self.name, %id, "returning shell entity");
                    Ok(Some(shell))
                }
            },
        }
    }

    /// Fetches the locales `id` still lacks, under the decide gate.
    async fn fetch_missing(&self, id: &M::Id, wanted: &BTreeSet<Locale>) -> Result<()> {
        let _permit = self
            .decide_gate
            .acquire()
            .await
            .map_err(|_| self.disposed_error())?;
        if self.disposed.is_cancelled() {
            return Err(self.disposed_error());
        }

        // Another caller may have fetched while we waited
        let missing = match self.store.get(id) {
            Some(entity) => entity.missing(wanted),
            None => wanted.clone(),
        };
        let to_fetch: Vec<Locale> = missing
            .into_iter()
            .filter(|locale| !self.ledger.contains(locale))
            .collect();
        if to_fetch.is_empty() {
            return Ok(());
        }

        self.fetch_locales(&to_fetch).await.map(|_| ())
    }

    // == Refresh ==
    /// Fetches whole locales regardless of any particular id.
    ///
    /// With `force` the locales are refetched even if the ledger has them.
    /// Returns the locales that were fetched and merged.
    pub async fn refresh(&self, locales: &[Locale], force: bool) -> Result<BTreeSet<Locale>> {
        let _permit = self
            .decide_gate
            .acquire()
            .await
            .map_err(|_| self.disposed_error())?;
        if self.disposed.is_cancelled() {
            return Err(self.disposed_error());
        }

        if force {
            self.ledger.forget(locales);
        }
        let to_fetch: Vec<Locale> = locales
            .iter()
            .filter(|locale| !self.ledger.contains(locale))
            .cloned()
            .collect();
        if to_fetch.is_empty() {
            return Ok(BTreeSet::new());
        }

        self.fetch_locales(&to_fetch).await
    }

    /// Fetches and merges every locale concurrently, waiting for all of them.
    ///
    /// Fails with the first error once all fetches are done; `Disposed` wins
    /// over other failures.
    async fn fetch_locales(&self, locales: &[Locale]) -> Result<BTreeSet<Locale>> {
        info!(
            cache = %self.name,
            resource = self.source.resource(),
            locales = ?locales,
            "fetching locales"
        );

        let results = join_all(locales.iter().map(|locale| self.fetch_and_merge(locale))).await;

        let mut fetched = BTreeSet::new();
        let mut failure: Option<CacheError> = None;
        for (locale, result) in locales.iter().zip(results) {
            match result {
                Ok(_) => {
                    fetched.insert(locale.clone());
                }
                Err(err) => {
                    debug!(cache = %self.name, %locale, error = %err, "locale fetch failed");
                    let replace = match &failure {
                        None => true,
                        Some(current) => {
                            matches!(err, CacheError::Disposed(_))
                                && !matches!(current, CacheError::Disposed(_))
                        }
                    };
                    if replace {
                        failure = Some(err);
                    }
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(fetched),
        }
    }

    async fn fetch_and_merge(&self, locale: &Locale) -> Result<MergeReport> {
        if self.disposed.is_cancelled() {
            return Err(self.disposed_error());
        }
        let payloads = self.source.fetch(locale).await?;
        if self.disposed.is_cancelled() {
            return Err(self.disposed_error());
        }
        self.merger.merge(locale, payloads).await
    }

    // == Push ==
    /// Merges payloads that arrived outside the fetch path.
    pub async fn push(&self, locale: &Locale, payloads: Vec<M>) -> Result<MergeReport> {
        self.merger.merge_pushed(locale, payloads).await
    }

    /// Locales fetched in full and still fresh.
    pub fn fetched_locales(&self) -> BTreeSet<Locale> {
        self.ledger.snapshot()
    }

    /// Forgets every fetched locale so the next refresh fetches all of them.
    pub fn forget_fetched(&self) {
        self.ledger.clear();
    }

    // == Dispose ==
    /// Tears the coordinator down: pending gate waiters fail and in-flight
    /// fetches stop before writing.
    pub fn dispose(&self) {
        self.disposed.cancel();
        self.decide_gate.close();
        self.merger.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }

    fn disposed_error(&self) -> CacheError {
        CacheError::Disposed(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::NamedValueDto;
    use crate::store::{ExpirationPolicy, ExpiringStore};
    use crate::validation::AcceptAll;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves ids 0..3 per locale and counts calls.
    #[derive(Default)]
    struct CountingSource {
        calls: parking_lot::Mutex<HashMap<Locale, usize>>,
        total: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    impl CountingSource {
        fn calls(&self, locale: &str) -> usize {
            self.calls.lock().get(&Locale::new(locale)).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl DataSource<NamedValueDto> for CountingSource {
        fn resource(&self) -> &str {
            "counting"
        }

        async fn fetch(&self, locale: &Locale) -> Result<Vec<NamedValueDto>> {
            *self.calls.lock().entry(locale.clone()).or_default() += 1;
            self.total.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(CacheError::Fetch {
                    resource: "counting".to_string(),
                    locale: locale.clone(),
                    message: "connection refused".to_string(),
                });
            }
            Ok((0..3)
                .map(|id| NamedValueDto::new(id, format!("{} {}", locale, id)))
                .collect())
        }
    }

    fn locales(codes: &[&str]) -> Vec<Locale> {
        codes.iter().map(|code| Locale::new(code)).collect()
    }

    fn coordinator(
        source: Arc<CountingSource>,
        strategy: ExceptionStrategy,
    ) -> FetchCoordinator<NamedValueDto> {
        FetchCoordinator::new(
            "test",
            Arc::new(ExpiringStore::new("test", ExpirationPolicy::never())),
            source,
            Arc::new(AcceptAll),
            Arc::new(FetchedLocales::default()),
            strategy,
            locales(&["en", "de", "hu"]),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_resolve_fetches_each_missing_locale_once() {
        let source = Arc::new(CountingSource::default());
        let coordinator = coordinator(Arc::clone(&source), ExceptionStrategy::Throw);

        let entity = coordinator.resolve(&0, &[]).await.unwrap().unwrap();
        assert!(entity.covers(&locales(&["en", "de", "hu"])));

        let entity = coordinator.resolve(&0, &locales(&["nl"])).await.unwrap().unwrap();
        assert_eq!(entity.get(&Locale::new("nl")).map(String::as_str), Some("nl 0"));
        assert_eq!(entity.get(&Locale::new("en")).map(String::as_str), Some("en 0"));

        for code in ["en", "de", "hu", "nl"] {
            assert_eq!(source.calls(code), 1, "locale {}", code);
        }
    }

    #[tokio::test]
    async fn test_covered_resolve_skips_fetching() {
        let source = Arc::new(CountingSource::default());
        let coordinator = coordinator(Arc::clone(&source), ExceptionStrategy::Throw);

        coordinator.resolve(&1, &locales(&["en"])).await.unwrap();
        coordinator.resolve(&2, &locales(&["en"])).await.unwrap();
        coordinator.resolve(&1, &locales(&["en"])).await.unwrap();

        assert_eq!(source.total.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_fetches() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let coordinator = Arc::new(coordinator(Arc::clone(&source), ExceptionStrategy::Throw));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    let wanted = if i % 2 == 0 {
                        locales(&["en", "de"])
                    } else {
                        locales(&["de", "hu"])
                    };
                    coordinator.resolve(&(i % 3), &wanted).await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        for code in ["en", "de", "hu"] {
            assert_eq!(source.calls(code), 1, "locale {}", code);
        }
    }

    #[tokio::test]
    async fn test_unknown_id_under_throw_is_not_found() {
        let source = Arc::new(CountingSource::default());
        let coordinator = coordinator(source, ExceptionStrategy::Throw);

        let result = coordinator.resolve(&1000, &[]).await;

        assert!(matches!(result, Err(CacheError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_unknown_id_under_catch_is_shell() {
        let source = Arc::new(CountingSource::default());
        let coordinator = coordinator(Arc::clone(&source), ExceptionStrategy::Catch);

        let shell = coordinator.resolve(&1000, &[]).await.unwrap().unwrap();

        assert_eq!(*shell.id(), 1000);
        assert!(shell.is_shell());
        assert!(shell.covers(&locales(&["en", "de", "hu"])));
        // the ledger stops a second round trip for the same locales
        coordinator.resolve(&1000, &[]).await.unwrap();
        assert_eq!(source.total.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_follows_strategy() {
        let failing = || {
            Arc::new(CountingSource {
                fail: true,
                ..Default::default()
            })
        };

        let throwing = coordinator(failing(), ExceptionStrategy::Throw);
        let result = throwing.resolve(&0, &locales(&["en"])).await;
        assert!(matches!(result, Err(CacheError::Fetch { .. })));

        let catching = coordinator(failing(), ExceptionStrategy::Catch);
        let shell = catching.resolve(&0, &locales(&["en"])).await.unwrap().unwrap();
        assert!(shell.is_shell());
    }

    #[tokio::test]
    async fn test_refresh_respects_ledger_unless_forced() {
        let source = Arc::new(CountingSource::default());
        let coordinator = coordinator(Arc::clone(&source), ExceptionStrategy::Throw);
        let all = locales(&["en", "de"]);

        assert_eq!(coordinator.refresh(&all, false).await.unwrap().len(), 2);
        assert!(coordinator.refresh(&all, false).await.unwrap().is_empty());
        assert_eq!(coordinator.refresh(&all, true).await.unwrap().len(), 2);

        assert_eq!(source.calls("en"), 2);
        assert_eq!(coordinator.fetched_locales().len(), 2);
    }

    #[tokio::test]
    async fn test_disposed_coordinator_resolves_to_none() {
        let source = Arc::new(CountingSource::default());
        let coordinator = coordinator(Arc::clone(&source), ExceptionStrategy::Throw);

        coordinator.dispose();

        assert!(coordinator.is_disposed());
        assert!(coordinator.resolve(&0, &[]).await.unwrap().is_none());
        assert!(matches!(
            coordinator.refresh(&locales(&["en"]), true).await,
            Err(CacheError::Disposed(_))
        ));
        assert_eq!(source.total.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispose_during_fetch_skips_writes() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let store = Arc::new(ExpiringStore::new("test", ExpirationPolicy::never()));
        let coordinator = Arc::new(FetchCoordinator::new(
            "test",
            Arc::clone(&store),
            source,
            Arc::new(AcceptAll),
            Arc::new(FetchedLocales::default()),
            ExceptionStrategy::Throw,
            locales(&["en"]),
            CancellationToken::new(),
        ));

        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.resolve(&0, &[]).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.dispose();

        assert!(pending.await.unwrap().unwrap().is_none());
        assert_eq!(store.count(), 0);
    }
}
