//! Configuration Module
//!
//! Cache settings plus the environment-driven configuration of the binary.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::locale::{parse_locale_list, Locale};
use crate::store::ExpirationPolicy;

// == Exception Strategy ==
/// What a cache does with recoverable failures while resolving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExceptionStrategy {
    /// Log and return a best-effort shell entity
    #[default]
    Catch,
    /// Propagate the failure to the caller
    Throw,
}

impl FromStr for ExceptionStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catch" => Ok(ExceptionStrategy::Catch),
            "throw" => Ok(ExceptionStrategy::Throw),
            other => Err(CacheError::Construction(format!(
                "unknown exception strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ExceptionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionStrategy::Catch => f.write_str("catch"),
            ExceptionStrategy::Throw => f.write_str("throw"),
        }
    }
}

// == Cache Config ==
/// Settings of one locale-aware cache.
///
/// ```rust
/// # use refcache::{CacheConfig, ExceptionStrategy, Locale};
/// # use std::time::Duration;
/// let config = CacheConfig::new("MatchStatus", [Locale::new("en"), Locale::new("de")])
///     .sliding_ttl(Duration::from_secs(12 * 3600))
///     .jitter_percent(20)
///     .strategy(ExceptionStrategy::Throw);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name used in logs, errors and health reports
    pub name: String,
    /// Lifetime from insertion, None = no absolute limit
    pub absolute_ttl: Option<Duration>,
    /// Lifetime from last read, None = no sliding limit
    pub sliding_ttl: Option<Duration>,
    /// ± percentage applied to the TTL per entry
    pub jitter_percent: u8,
    /// How often expired entries are swept from the store
    pub scan_interval: Duration,
    /// Locales kept warm by the refresh scheduler; also the default for lookups
    pub prefetch_locales: Vec<Locale>,
    /// Failure handling while resolving
    pub strategy: ExceptionStrategy,
    /// Delay before the first refresh tick
    pub refresh_due: Duration,
    /// Period between refresh ticks, zero = a single tick
    pub refresh_period: Duration,
}

impl CacheConfig {
    /// Creates a config with default timings.
    pub fn new(
        name: impl Into<String>,
        prefetch_locales: impl IntoIterator<Item = Locale>,
    ) -> Self {
        Self {
            name: name.into(),
            absolute_ttl: None,
            sliding_ttl: Some(Duration::from_secs(12 * 3600)),
            jitter_percent: 20,
            scan_interval: Duration::from_secs(60),
            prefetch_locales: prefetch_locales.into_iter().collect(),
            strategy: ExceptionStrategy::Catch,
            refresh_due: Duration::from_secs(5),
            refresh_period: Duration::from_secs(6 * 3600),
        }
    }

    /// Sets the lifetime from insertion.
    pub fn absolute_ttl(mut self, ttl: Duration) -> Self {
        self.absolute_ttl = Some(ttl);
        self
    }

    /// Sets the lifetime from last read.
    pub fn sliding_ttl(mut self, ttl: Duration) -> Self {
        self.sliding_ttl = Some(ttl);
        self
    }

    /// Entries never expire.
    pub fn no_expiration(mut self) -> Self {
        self.absolute_ttl = None;
        self.sliding_ttl = None;
        self
    }

    pub fn jitter_percent(mut self, percent: u8) -> Self {
        self.jitter_percent = percent;
        self
    }

    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn strategy(mut self, strategy: ExceptionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the refresh timer's due time and period.
    pub fn refresh(mut self, due: Duration, period: Duration) -> Self {
        self.refresh_due = due;
        self.refresh_period = period;
        self
    }

    /// Expiry handed to the entity store.
    pub fn expiration_policy(&self) -> ExpirationPolicy {
        ExpirationPolicy {
            absolute: self.absolute_ttl,
            sliding: self.sliding_ttl,
            jitter_percent: self.jitter_percent,
        }
    }

    // == Validate ==
    /// Fails fast on settings a cache cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CacheError::Construction("cache name cannot be empty".to_string()));
        }
        if self.prefetch_locales.is_empty() {
            return Err(CacheError::Construction(format!(
                "cache '{}' needs at least one prefetch locale",
                self.name
            )));
        }
        if self.jitter_percent > 100 {
            return Err(CacheError::Construction(format!(
                "jitter of {}% exceeds 100%",
                self.jitter_percent
            )));
        }
        if self.scan_interval.is_zero() {
            return Err(CacheError::Construction("scan interval cannot be zero".to_string()));
        }
        Ok(())
    }
}

// == Config ==
/// Configuration of the `refcache` binary.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings of the served cache
    pub cache: CacheConfig,
    /// HTTP diagnostics port
    pub server_port: u16,
    /// Directory read by the file data source
    pub data_dir: PathBuf,
    /// File stem of the payload files (`{resource}_{locale}.json`)
    pub data_resource: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Cache name (default: MatchStatus)
    /// - `CACHE_TTL_SECS` - Entry TTL in seconds, 0 = never (default: 43200)
    /// - `CACHE_SLIDING` - Sliding instead of absolute TTL (default: true)
    /// - `CACHE_JITTER_PERCENT` - TTL jitter (default: 20)
    /// - `CACHE_SCAN_INTERVAL_MS` - Sweep frequency (default: 60000)
    /// - `PREFETCH_LOCALES` - Comma separated locales (default: en)
    /// - `EXCEPTION_STRATEGY` - catch or throw (default: catch)
    /// - `REFRESH_DUE_SECS` - First refresh delay (default: 5)
    /// - `REFRESH_PERIOD_SECS` - Refresh period, 0 = once (default: 21600)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_DIR` - Payload directory (default: data)
    /// - `DATA_RESOURCE` - Payload file stem (default: match_status)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let name = env::var("CACHE_NAME").unwrap_or(defaults.cache.name.clone());
        let locales = env::var("PREFETCH_LOCALES")
            .map(|raw| parse_locale_list(&raw))
            .unwrap_or(defaults.cache.prefetch_locales.clone());
        let strategy = match env::var("EXCEPTION_STRATEGY") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.cache.strategy,
        };

        let ttl = Duration::from_secs(env_or("CACHE_TTL_SECS", 12 * 3600));
        let sliding = env_or("CACHE_SLIDING", true);

        let mut cache = CacheConfig::new(name, locales)
            .no_expiration()
            .jitter_percent(env_or("CACHE_JITTER_PERCENT", defaults.cache.jitter_percent))
            .scan_interval(Duration::from_millis(env_or("CACHE_SCAN_INTERVAL_MS", 60_000)))
            .strategy(strategy)
            .refresh(
                Duration::from_secs(env_or("REFRESH_DUE_SECS", 5)),
                Duration::from_secs(env_or("REFRESH_PERIOD_SECS", 6 * 3600)),
            );
        if sliding {
            cache = cache.sliding_ttl(ttl);
        } else {
            cache = cache.absolute_ttl(ttl);
        }
        cache.validate()?;

        Ok(Self {
            cache,
            server_port: env_or("SERVER_PORT", defaults.server_port),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            data_resource: env::var("DATA_RESOURCE").unwrap_or(defaults.data_resource),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::new("MatchStatus", [Locale::new("en")]),
            server_port: 3000,
            data_dir: PathBuf::from("data"),
            data_resource: "match_status".to_string(),
        }
    }
}

/// Reads and parses an environment variable, falling back to `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
