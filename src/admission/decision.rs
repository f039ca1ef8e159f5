//! Admission outcome returned to the request-dispatch layer.

use std::time::Duration;

/// Metadata key carrying the bucket capacity.
pub const LIMIT_KEY: &str = "x-ratelimit-limit";

/// Metadata key carrying the tokens left after this call.
pub const REMAINING_KEY: &str = "x-ratelimit-remaining";

/// Metadata key carrying the retry hint, in whole seconds.
pub const RETRY_AFTER_KEY: &str = "x-ratelimit-retry-after";

/// Outcome of one admission check.
///
/// A rejection is a normal value, not an error: the caller inspects
/// [`admitted`](Self::admitted) and either dispatches the request or emits
/// its own throttling response.
///
/// ```rust
/// use std::time::Instant;
/// use tollbooth::{AdmissionConfig, LimiterRegistry};
///
/// let registry = LimiterRegistry::new();
/// let config = AdmissionConfig::new(1, 1);
/// let now = Instant::now();
///
/// let first = registry.check("10.0.0.1", &config, now).unwrap();
/// assert!(first.admitted);
///
/// let second = registry.check("10.0.0.1", &config, now).unwrap();
/// assert!(!second.admitted);
/// assert_eq!(second.remaining, 0);
/// assert_eq!(second.limit, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionResult {
    /// Whether the request may proceed.
    pub admitted: bool,

    /// Tokens left in the bucket after this call (0 on rejection).
    pub remaining: u64,

    /// Bucket capacity.
    pub limit: u64,

    /// Time until the next whole token accrues. Zero when admitted.
    pub retry_after: Duration,
}

impl AdmissionResult {
    pub(crate) fn admitted(remaining: u64, limit: u64) -> Self {
        Self {
            admitted: true,
            remaining,
            limit,
            retry_after: Duration::ZERO,
        }
    }

    pub(crate) fn rejected(limit: u64, retry_after: Duration) -> Self {
        Self {
            admitted: false,
            remaining: 0,
            limit,
            retry_after,
        }
    }

    /// Returns `true` if the request may proceed.
    #[inline]
    pub fn is_admitted(&self) -> bool {
        self.admitted
    }

    /// Retry hint in whole seconds, rounded up.
    ///
    /// Zero when admitted, at least 1 when rejected.
    pub fn retry_after_secs(&self) -> u64 {
        if self.admitted {
            return 0;
        }
        let secs = self.retry_after.as_secs();
        let secs = if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        secs.max(1)
    }

    /// Header-like key/value pairs describing this outcome.
    ///
    /// The retry hint is only included on rejection. How these pairs reach
    /// the client is up to the caller.
    ///
    /// ```rust
    /// use std::time::Instant;
    /// use tollbooth::{AdmissionConfig, LimiterRegistry};
    ///
    /// let registry = LimiterRegistry::new();
    /// let result = registry
    ///     .check("10.0.0.1", &AdmissionConfig::new(5, 1), Instant::now())
    ///     .unwrap();
    ///
    /// let metadata = result.metadata();
    /// assert_eq!(metadata[0], ("x-ratelimit-limit", "5".to_string()));
    /// assert_eq!(metadata[1], ("x-ratelimit-remaining", "4".to_string()));
    /// assert_eq!(metadata.len(), 2);
    /// ```
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (LIMIT_KEY, self.limit.to_string()),
            (REMAINING_KEY, self.remaining.to_string()),
        ];
        if !self.admitted {
            pairs.push((RETRY_AFTER_KEY, self.retry_after_secs().to_string()));
        }
        pairs
    }
}
