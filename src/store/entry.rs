//! Cache Entry Module
//!
//! Defines individual store entries with absolute and sliding expiry.

use std::time::{Duration, Instant};

use rand::Rng;

// == Expiration Policy ==
/// How long entries live in an [`ExpiringStore`](super::ExpiringStore).
///
/// Both limits may be set at once; an entry expires when either is reached.
/// A zero or absent duration means that limit never applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationPolicy {
    /// Lifetime measured from insertion
    pub absolute: Option<Duration>,
    /// Lifetime measured from the last successful read
    pub sliding: Option<Duration>,
    /// Random ± variance applied per entry, in percent of the duration
    pub jitter_percent: u8,
}

impl ExpirationPolicy {
    /// Entries never expire.
    pub fn never() -> Self {
        Self::default()
    }

    /// Entries expire a fixed time after insertion.
    pub fn absolute(ttl: Duration) -> Self {
        Self {
            absolute: Some(ttl),
            ..Self::default()
        }
    }

    /// Entries expire after `ttl` without a read.
    pub fn sliding(ttl: Duration) -> Self {
        Self {
            sliding: Some(ttl),
            ..Self::default()
        }
    }

    /// Sets the jitter percentage (clamped to 100).
    pub fn with_jitter(mut self, percent: u8) -> Self {
        self.jitter_percent = percent.min(100);
        self
    }

    /// Returns true when neither limit applies.
    pub fn is_eternal(&self) -> bool {
        non_zero(self.absolute).is_none() && non_zero(self.sliding).is_none()
    }

    /// Shortest time any entry is guaranteed to live, jitter included.
    ///
    /// None when entries never expire.
    pub fn min_lifetime(&self) -> Option<Duration> {
        let shortest = match (non_zero(self.absolute), non_zero(self.sliding)) {
            (Some(a), Some(s)) => a.min(s),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => return None,
        };
        let spread = f64::from(self.jitter_percent.min(100)) / 100.0;
        scale(shortest, (1.0 - spread).max(0.01))
    }
}

// == Cache Entry ==
/// A single stored value with its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was inserted
    pub created_at: Instant,
    /// When the entry was last read (or inserted)
    pub last_accessed: Instant,
    /// Absolute deadline, None = no absolute limit
    pub expires_at: Option<Instant>,
    /// Sliding window (already jittered), None = no sliding limit
    pub sliding: Option<Duration>,
    /// Multiplier applied to the policy durations for this entry
    pub jitter: f64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry whose limits are drawn from `policy`.
    pub fn new(value: V, policy: &ExpirationPolicy) -> Self {
        let jitter = jitter_factor(policy.jitter_percent, &mut rand::thread_rng());
        Self::with_jitter(value, policy, jitter)
    }

    /// Creates an entry using an explicit jitter multiplier.
    ///
    /// A limit too large to represent is treated as never reached.
    pub fn with_jitter(value: V, policy: &ExpirationPolicy, jitter: f64) -> Self {
        let now = Instant::now();
        let (expires_at, sliding) = limits(policy, jitter, now);

        Self {
            value,
            created_at: now,
            last_accessed: now,
            expires_at,
            sliding,
            jitter,
        }
    }

    // == Rearm ==
    /// Restarts both limits from now, keeping the entry's jitter.
    pub fn rearm(&mut self, policy: &ExpirationPolicy) {
        let now = Instant::now();
        let (expires_at, sliding) = limits(policy, self.jitter, now);
        self.last_accessed = now;
        self.expires_at = expires_at;
        self.sliding = sliding;
    }

    // == Is Expired ==
    /// Checks whether the entry is expired at `now`.
    ///
    /// Boundary: reaching the deadline exactly counts as expired.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        if let Some(deadline) = self.expires_at {
            if now >= deadline {
                return true;
            }
        }
        match self.sliding {
            Some(window) => now.saturating_duration_since(self.last_accessed) >= window,
            None => false,
        }
    }

    /// Checks whether the entry is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Touch ==
    /// Records a read, prolonging a sliding entry.
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    // == Time To Live ==
    /// Returns the time until the entry expires, or None if it never does.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        let absolute = self
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(now));
        let sliding = self
            .sliding
            .map(|window| match self.last_accessed.checked_add(window) {
                Some(deadline) => deadline.saturating_duration_since(now),
                None => Duration::MAX,
            });
        match (absolute, sliding) {
            (Some(a), Some(s)) => Some(a.min(s)),
            (a, s) => a.or(s),
        }
    }
}

// == Utility Functions ==
fn non_zero(duration: Option<Duration>) -> Option<Duration> {
    duration.filter(|d| !d.is_zero())
}

/// Jittered absolute deadline and sliding window, counted from `now`.
fn limits(
    policy: &ExpirationPolicy,
    jitter: f64,
    now: Instant,
) -> (Option<Instant>, Option<Duration>) {
    let absolute = non_zero(policy.absolute)
        .and_then(|ttl| scale(ttl, jitter))
        .and_then(|ttl| now.checked_add(ttl));
    let sliding = non_zero(policy.sliding).and_then(|ttl| scale(ttl, jitter));
    (absolute, sliding)
}

fn scale(ttl: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(ttl.as_secs_f64() * factor).ok()
}

/// Draws a multiplier in `[1 - percent/100, 1 + percent/100]`.
pub fn jitter_factor(percent: u8, rng: &mut impl Rng) -> f64 {
    if percent == 0 {
        return 1.0;
    }
    let spread = f64::from(percent.min(100)) / 100.0;
    // a zero multiplier would expire the entry on insertion
    (1.0 + rng.gen_range(-spread..=spread)).max(0.01)
}
