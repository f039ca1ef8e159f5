//! # Metrics
//!
//! Point-in-time snapshots for monitoring: [`BucketMetrics`] for a single
//! client and [`RegistryStats`] for the registry as a whole.
//!
//! ```text
//!     Bucket 10.0.0.7:
//!     ┌─────────────────────────────────────┐
//!     │  Success Rate: 85%                  │
//!     │  Tokens: 3/20                       │
//!     │  Refills: 41                        │
//!     └─────────────────────────────────────┘
//! ```

use std::fmt;

/// Snapshot of one bucket's counters.
///
/// ```rust
/// use std::time::Instant;
/// use tollbooth::{AdmissionConfig, TokenBucket};
///
/// let now = Instant::now();
/// let bucket = TokenBucket::new(AdmissionConfig::new(2, 1), now).unwrap();
/// bucket.try_consume(now);
/// bucket.try_consume(now);
/// bucket.try_consume(now);
///
/// let metrics = bucket.metrics();
/// assert_eq!(metrics.total_admitted, 2);
/// assert_eq!(metrics.total_rejected, 1);
/// println!("{}", metrics.summary());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMetrics {
    /// Requests admitted.
    pub total_admitted: u64,

    /// Requests rejected.
    pub total_rejected: u64,

    /// Refills that added at least one token.
    pub total_refills: u64,

    /// Tokens held when the snapshot was taken.
    pub current_tokens: u64,

    /// Bucket capacity.
    pub capacity: u64,
}

impl BucketMetrics {
    /// Fraction of checks that were admitted. 1.0 before any check.
    #[inline]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            1.0
        } else {
            self.total_admitted as f64 / total as f64
        }
    }

    /// Fraction of checks that were rejected.
    #[inline]
    pub fn rejection_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// How much of the capacity is used: 0.0 full, 1.0 empty.
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            1.0 - (self.current_tokens as f64 / self.capacity as f64)
        }
    }

    /// Total checks, admitted plus rejected.
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.total_admitted + self.total_rejected
    }

    /// Human-readable report.
    pub fn summary(&self) -> String {
        format!(
            "Bucket Metrics:\n\
             ├─ Success Rate: {:.2}%\n\
             ├─ Tokens: {}/{}\n\
             ├─ Utilization: {:.2}%\n\
             └─ Counters:\n\
                ├─ Admitted: {}\n\
                ├─ Rejected: {}\n\
                └─ Refills: {}",
            self.success_rate() * 100.0,
            self.current_tokens,
            self.capacity,
            self.utilization() * 100.0,
            self.total_admitted,
            self.total_rejected,
            self.total_refills,
        )
    }
}

impl fmt::Display for BucketMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Snapshot of the registry's population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    /// Buckets currently held.
    pub active_buckets: usize,

    /// Buckets created since startup.
    pub total_created: u64,

    /// Buckets removed since startup, by eviction or `clear`.
    pub total_evicted: u64,
}

impl RegistryStats {
    /// Fraction of created buckets that have since been removed.
    pub fn eviction_ratio(&self) -> f64 {
        if self.total_created == 0 {
            0.0
        } else {
            self.total_evicted as f64 / self.total_created as f64
        }
    }

    /// Human-readable report.
    pub fn summary(&self) -> String {
        format!(
            "Limiter Registry Stats:\n\
             ├─ Active Buckets: {}\n\
             └─ Lifetime:\n\
                ├─ Total Created: {}\n\
                └─ Total Evicted: {}",
            self.active_buckets, self.total_created, self.total_evicted
        )
    }
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
