//! Refresh Scheduler
//!
//! Periodic task keeping the prefetch locales of a cache warm.
//!
//! The first cycle only fills locales never fetched; every later cycle
//! refetches the full prefetch set.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::coordinator::FetchCoordinator;
use crate::entity::Mergeable;
use crate::error::{CacheError, Result};
use crate::locale::Locale;

// == Scheduler State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started yet
    Idle,
    /// Armed; ticks fill locales never fetched
    FirstCycle,
    /// Ticks refetch the whole prefetch set
    SteadyState,
    /// Timer halted
    Stopped,
}

struct Shared<M: Mergeable> {
    coordinator: Arc<FetchCoordinator<M>>,
    prefetch: Vec<Locale>,
    state: Mutex<SchedulerState>,
}

// == Refresh Scheduler ==
/// Timer driving whole-locale refreshes through a [`FetchCoordinator`].
pub struct RefreshScheduler<M: Mergeable> {
    shared: Arc<Shared<M>>,
    due: Duration,
    period: Duration,
    stop: Mutex<Option<CancellationToken>>,
}

impl<M: Mergeable> RefreshScheduler<M> {
    /// Creates an idle scheduler. A zero `period` fires a single tick after `due`.
    pub fn new(
        coordinator: Arc<FetchCoordinator<M>>,
        prefetch: Vec<Locale>,
        due: Duration,
        period: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                coordinator,
                prefetch,
                state: Mutex::new(SchedulerState::Idle),
            }),
            due,
            period,
            stop: Mutex::new(None),
        }
    }

    // == Start ==
    /// Arms the timer and returns immediately.
    ///
    /// The timer runs until `token` (or [`stop`](Self::stop)) cancels it.
    /// Needs a running tokio runtime.
    pub fn start(&self, token: &CancellationToken) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| {
            CacheError::Construction("refresh scheduler needs a running tokio runtime".to_string())
        })?;

        {
            let mut state = self.shared.state.lock();
            if *state != SchedulerState::Idle {
                return Err(CacheError::Construction(format!(
                    "refresh scheduler of '{}' was already started",
                    self.shared.coordinator.name()
                )));
            }
            *state = SchedulerState::FirstCycle;
        }

        let token = token.child_token();
        *self.stop.lock() = Some(token.clone());

        let shared = Arc::clone(&self.shared);
        runtime.spawn(run(shared, self.due, self.period, token));

        debug!(
            cache = self.shared.coordinator.name(),
            due = ?self.due,
            period = ?self.period,
            "refresh scheduler armed"
        );
        Ok(())
    }

    // == Stop ==
    /// Halts the timer. Ticks in flight observe the cancellation and exit.
    pub fn stop(&self) {
        *self.shared.state.lock() = SchedulerState::Stopped;
        if let Some(token) = self.stop.lock().take() {
            token.cancel();
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }

    pub fn due(&self) -> Duration {
        self.due
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

async fn run<M: Mergeable>(
    shared: Arc<Shared<M>>,
    due: Duration,
    period: Duration,
    token: CancellationToken,
) {
    let Some(first) = Instant::now().checked_add(due) else {
        warn!(
            cache = shared.coordinator.name(),
            ?due,
            "refresh due time out of range, timer not armed"
        );
        return;
    };

    if period.is_zero() {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(cache = shared.coordinator.name(), "refresh stopped before its only tick");
                return;
            }
            _ = sleep_until(first) => {}
        }
        tick(shared, token).await;
        return;
    }

    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(cache = shared.coordinator.name(), "refresh timer stopped");
                break;
            }
            _ = ticker.tick() => {
                // a slow tick must not hold back the next one
                tokio::spawn(tick(Arc::clone(&shared), token.clone()));
            }
        }
    }
}

// == Tick ==
async fn tick<M: Mergeable>(shared: Arc<Shared<M>>, token: CancellationToken) {
    let cache = shared.coordinator.name();
    let state = *shared.state.lock();

    let (locales, force) = match state {
        SchedulerState::Idle | SchedulerState::Stopped => return,
        SchedulerState::FirstCycle => {
            let fetched = shared.coordinator.fetched_locales();
            let gaps: Vec<Locale> = shared
                .prefetch
                .iter()
                .filter(|locale| !fetched.contains(*locale))
                .cloned()
                .collect();
            if gaps.is_empty() {
                debug!(cache, "prefetch locales already present, skipping first cycle");
                advance(&shared);
                return;
            }
            (gaps, false)
        }
        SchedulerState::SteadyState => (shared.prefetch.clone(), true),
    };

    let result = tokio::select! {
        _ = token.cancelled() => {
            debug!(cache, "refresh tick cancelled by shutdown");
            return;
        }
        result = shared.coordinator.refresh(&locales, force) => result,
    };

    match result {
        Ok(fetched) => {
            info!(cache, fetched = ?fetched, "refresh tick completed");
            advance(&shared);
        }
        Err(CacheError::Disposed(_)) => {
            debug!(cache, "refresh tick skipped, cache disposed");
        }
        Err(err) if err.is_recoverable() => {
            warn!(cache, error = %err, "refresh tick failed, retrying on next tick");
        }
        Err(err) => {
            error!(cache, error = %err, "refresh tick failed");
            advance(&shared);
        }
    }
}

/// Moves a running scheduler into steady state.
fn advance<M: Mergeable>(shared: &Shared<M>) {
    let mut state = shared.state.lock();
    if *state == SchedulerState::FirstCycle {
        *state = SchedulerState::SteadyState;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExceptionStrategy;
    use crate::merge::FetchedLocales;
    use crate::payload::NamedValueDto;
    use crate::source::DataSource;
    use crate::store::{ExpirationPolicy, ExpiringStore};
    use crate::validation::AcceptAll;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataSource<NamedValueDto> for CountingSource {
        fn resource(&self) -> &str {
            "counting"
        }

        async fn fetch(&self, _locale: &Locale) -> Result<Vec<NamedValueDto>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![NamedValueDto::new(0, "value")])
        }
    }

    fn scheduler(
        source: Arc<CountingSource>,
        due: Duration,
        period: Duration,
    ) -> (RefreshScheduler<NamedValueDto>, Arc<FetchCoordinator<NamedValueDto>>) {
        let locales = vec![Locale::new("en"), Locale::new("de")];
        let coordinator = Arc::new(FetchCoordinator::new(
            "test",
            Arc::new(ExpiringStore::new("test", ExpirationPolicy::never())),
            source,
            Arc::new(AcceptAll),
            Arc::new(FetchedLocales::default()),
            ExceptionStrategy::Catch,
            locales.clone(),
            CancellationToken::new(),
        ));
        (
            RefreshScheduler::new(Arc::clone(&coordinator), locales, due, period),
            coordinator,
        )
    }

    #[tokio::test]
    async fn test_start_does_not_fetch_before_due() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, _) = scheduler(
            Arc::clone(&source),
            Duration::from_secs(10),
            Duration::from_secs(60),
        );

        scheduler.start(&CancellationToken::new()).unwrap();

        assert_eq!(scheduler.state(), SchedulerState::FirstCycle);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_first_cycle_fills_gaps_then_steady_state_refetches() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, coordinator) = scheduler(
            Arc::clone(&source),
            Duration::from_millis(10),
            Duration::from_millis(100),
        );

        scheduler.start(&CancellationToken::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.state(), SchedulerState::SteadyState);
        assert_eq!(coordinator.fetched_locales().len(), 2);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(source.calls.load(Ordering::SeqCst) >= 4);
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_first_cycle_skips_when_everything_fetched() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, coordinator) = scheduler(
            Arc::clone(&source),
            Duration::from_millis(10),
            Duration::ZERO,
        );
        coordinator
            .refresh(&[Locale::new("en"), Locale::new("de")], false)
            .await
            .unwrap();

        scheduler.start(&CancellationToken::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.state(), SchedulerState::SteadyState);
    }

    struct MisconfiguredSource;

    #[async_trait]
    impl DataSource<NamedValueDto> for MisconfiguredSource {
        fn resource(&self) -> &str {
            "misconfigured"
        }

        async fn fetch(&self, _locale: &Locale) -> Result<Vec<NamedValueDto>> {
            Err(CacheError::Construction("no data directory".to_string()))
        }
    }

    fn coordinator_over(
        source: Arc<dyn DataSource<NamedValueDto>>,
    ) -> Arc<FetchCoordinator<NamedValueDto>> {
        Arc::new(FetchCoordinator::new(
            "test",
            Arc::new(ExpiringStore::new("test", ExpirationPolicy::never())),
            source,
            Arc::new(AcceptAll),
            Arc::new(FetchedLocales::default()),
            ExceptionStrategy::Catch,
            vec![Locale::new("en")],
            CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_unrecoverable_first_cycle_failure_moves_to_steady_state() {
        let scheduler = RefreshScheduler::new(
            coordinator_over(Arc::new(MisconfiguredSource)),
            vec![Locale::new("en")],
            Duration::from_millis(10),
            Duration::ZERO,
        );

        scheduler.start(&CancellationToken::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(scheduler.state(), SchedulerState::SteadyState);
    }

    #[tokio::test]
    async fn test_out_of_range_due_time_never_fires() {
        let source = Arc::new(CountingSource::default());
        let scheduler = RefreshScheduler::new(
            coordinator_over(source.clone()),
            vec![Locale::new("en")],
            Duration::MAX,
            Duration::from_millis(10),
        );

        scheduler.start(&CancellationToken::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.state(), SchedulerState::FirstCycle);
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_halts_timer() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, _) = scheduler(
            Arc::clone(&source),
            Duration::from_millis(30),
            Duration::from_millis(30),
        );

        scheduler.start(&CancellationToken::new()).unwrap();
        scheduler.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (scheduler, _) = scheduler(
            Arc::new(CountingSource::default()),
            Duration::from_secs(10),
            Duration::from_secs(10),
        );
        let token = CancellationToken::new();

        scheduler.start(&token).unwrap();

        assert!(matches!(scheduler.start(&token), Err(CacheError::Construction(_))));
        token.cancel();
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let (scheduler, _) = scheduler(
            Arc::new(CountingSource::default()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        assert!(scheduler.start(&CancellationToken::new()).is_err());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
