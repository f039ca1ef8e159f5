//! # Admission Configuration
//!
//! Two configuration types live here:
//!
//! - [`AdmissionConfig`]: the per-client bucket parameters the collaborator
//!   passes on every check (capacity, refill rate, optional stale gap).
//! - [`RegistryConfig`]: how the registry sizes its map and when it considers
//!   a bucket idle enough to evict.
//!
//! ```text
//!     AdmissionConfig:
//!     ┌──────────────────────────────┐
//!     │ capacity: 20                 │ ← burst limit
//!     │ refill_rate: 10              │ ← whole tokens per second
//!     │ stale_gap: Some(50ms)        │ ← skip refill below this age
//!     │                              │
//!     │ Result: 10 req/s sustained   │
//!     │         20 burst             │
//!     └──────────────────────────────┘
//! ```

use super::error::{AdmissionError, Result};
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Bucket parameters supplied by the caller on every admission check.
///
/// Values are fixed for an identity the first time its bucket is created;
/// later calls carrying different values do not reconfigure that bucket.
///
/// ## Examples
///
/// ```rust
/// use std::time::Duration;
/// use tollbooth::AdmissionConfig;
///
/// // 2 tokens of burst, 2 tokens per second
/// let config = AdmissionConfig::new(2, 2);
/// assert!(config.validate().is_ok());
///
/// // Skip refill for calls closer together than 100ms
/// let config = AdmissionConfig::per_second(50)
///     .with_stale_gap(Duration::from_millis(100));
/// assert_eq!(config.capacity, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Maximum tokens a bucket holds at once (burst capacity). Must be >= 1.
    pub capacity: u64,

    /// Whole tokens added per second of elapsed time. Must be >= 1.
    ///
    /// Fractional accrual is truncated when a refill happens.
    pub refill_rate: u64,

    /// Elapsed time below which a refill is skipped entirely.
    ///
    /// Setting this too high starves refills between bursts; `None` refills
    /// on every call that has accrued at least one whole token.
    pub stale_gap: Option<Duration>,
}

impl Default for AdmissionConfig {
    /// 50 tokens of burst, 10 tokens per second, no stale gap.
    fn default() -> Self {
        Self {
            capacity: 50,
            refill_rate: 10,
            stale_gap: None,
        }
    }
}

impl AdmissionConfig {
    /// Creates a configuration with the given capacity and refill rate.
    pub fn new(capacity: u64, refill_rate: u64) -> Self {
        Self {
            capacity,
            refill_rate,
            stale_gap: None,
        }
    }

    /// Limits to `requests_per_second`, with a burst of twice that.
    pub fn per_second(requests_per_second: u64) -> Self {
        Self::new(requests_per_second.saturating_mul(2), requests_per_second)
    }

    /// Sets the burst capacity as a multiple of the refill rate.
    pub fn with_burst_multiplier(mut self, multiplier: u64) -> Self {
        self.capacity = self.refill_rate.saturating_mul(multiplier);
        self
    }

    /// Sets the stale gap.
    pub fn with_stale_gap(mut self, gap: Duration) -> Self {
        self.stale_gap = Some(gap);
        self
    }

    /// Checks that capacity and refill rate are both at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Configuration`] naming the first bad field.
    ///
    /// ```rust
    /// use tollbooth::AdmissionConfig;
    ///
    /// assert!(AdmissionConfig::new(0, 10).validate().is_err());
    /// assert!(AdmissionConfig::new(10, 0).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(AdmissionError::config("capacity", "must be greater than 0"));
        }
        if self.refill_rate == 0 {
            return Err(AdmissionError::config(
                "refill_rate",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Time for one whole token to accrue.
    pub fn token_interval(&self) -> Duration {
        let rate = self.refill_rate.max(1);
        // Round up so that a caller waiting this long always finds a token.
        let nanos = NANOS_PER_SEC / rate + u64::from(NANOS_PER_SEC % rate != 0);
        Duration::from_nanos(nanos)
    }

    /// Time for an empty bucket to refill completely, rounded up to whole
    /// seconds.
    pub fn full_refill_period(&self) -> Duration {
        let rate = self.refill_rate.max(1);
        let secs = self.capacity / rate + u64::from(self.capacity % rate != 0);
        Duration::from_secs(secs)
    }
}

/// Settings for the registry's map and its idle-eviction sweep.
///
/// A bucket becomes evictable once it has gone untouched for
/// `idle_factor` full refill periods, at least `min_idle`, and at least the
/// bucket's stale gap. By then it would be full again, so evicting it never
/// changes an admission decision.
///
/// ```rust
/// use std::time::Duration;
/// use tollbooth::RegistryConfig;
///
/// let config = RegistryConfig::default()
///     .with_sweep_interval(Duration::from_secs(30))
///     .with_idle_factor(4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How often the background sweeper runs.
    pub sweep_interval: Duration,

    /// Multiple of a bucket's full refill period after which it is idle.
    pub idle_factor: u32,

    /// Lower bound on the idle threshold, whatever the bucket's period.
    pub min_idle: Duration,

    /// Initial map capacity.
    pub initial_capacity: usize,
}

impl Default for RegistryConfig {
    /// Sweeps every minute, evicts after two full refill periods (never
    /// sooner than one second), pre-sizes for 1024 clients.
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            idle_factor: 2,
            min_idle: Duration::from_secs(1),
            initial_capacity: 1024,
        }
    }
}

impl RegistryConfig {
    /// Sets the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the idle factor.
    pub fn with_idle_factor(mut self, factor: u32) -> Self {
        self.idle_factor = factor;
        self
    }

    /// Sets the minimum idle threshold.
    pub fn with_min_idle(mut self, min_idle: Duration) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Sets the initial map capacity.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Checks that the sweep interval and idle factor are non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Configuration`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(AdmissionError::config(
                "sweep_interval",
                "must be greater than 0",
            ));
        }
        if self.idle_factor == 0 {
            return Err(AdmissionError::config(
                "idle_factor",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Idle threshold for a bucket configured with `config`.
    ///
    /// Never shorter than the bucket's stale gap: below that age a refill
    /// is skipped, so the bucket would not yet be full.
    pub(crate) fn idle_threshold(&self, config: &AdmissionConfig) -> Duration {
        config
            .full_refill_period()
            .saturating_mul(self.idle_factor)
            .max(self.min_idle)
            .max(config.stale_gap.unwrap_or_default())
    }
}
