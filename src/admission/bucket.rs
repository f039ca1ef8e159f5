//! # Token Bucket
//!
//! One client's request budget. Each check refills the bucket from the time
//! elapsed since the last refill, then tries to take one token.
//!
//! ```text
//!     capacity = 2, refill_rate = 2/s
//!
//!     t0       [🪙🪙]  check ✅ → [🪙]
//!     t0       [🪙]    check ✅ → []
//!     t0       []      check ❌ (retry in 500ms)
//!     t0 + 1s  +2 → [🪙🪙] (capped at 2), check ✅ → [🪙]
//! ```
//!
//! ## Locking
//!
//! Refill and consume happen as one step under a per-bucket mutex. Reading
//! `tokens` and `last_refill` outside that lock would let two racing callers
//! both see the last token, or both refill from the same elapsed time.
//! The lock is per bucket, so unrelated clients never wait on each other.
//!
//! ## Time
//!
//! Timestamps are [`Instant`]s supplied by the caller. A `now` earlier than
//! the last refill counts as zero elapsed time: tokens are never taken away
//! and `last_refill` never moves backwards.

use super::{
    config::AdmissionConfig, decision::AdmissionResult, error::Result, metrics::BucketMetrics,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Mutable state, only touched with the bucket lock held.
#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
    /// Latest timestamp any check has presented. Drives idle eviction.
    last_seen: Instant,
    /// Set by the eviction sweep just before the bucket leaves the registry.
    retired: bool,
}

/// A single client's token bucket.
///
/// Buckets are normally created and owned by a
/// [`LimiterRegistry`](super::LimiterRegistry), but can be used on their own:
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use tollbooth::{AdmissionConfig, TokenBucket};
///
/// let t0 = Instant::now();
/// let bucket = TokenBucket::new(AdmissionConfig::new(2, 2), t0).unwrap();
///
/// assert_eq!(bucket.try_consume(t0).remaining, 1);
/// assert_eq!(bucket.try_consume(t0).remaining, 0);
/// assert!(!bucket.try_consume(t0).admitted);
///
/// let later = bucket.try_consume(t0 + Duration::from_secs(1));
/// assert!(later.admitted);
/// assert_eq!(later.remaining, 1);
/// ```
pub struct TokenBucket {
    state: Mutex<BucketState>,
    config: AdmissionConfig,

    // Counters are read without the lock for metrics snapshots.
    total_admitted: AtomicU64,
    total_rejected: AtomicU64,
    total_refills: AtomicU64,
}

impl TokenBucket {
    /// Creates a full bucket whose refill clock starts at `now`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `capacity` or `refill_rate` is 0.
    pub fn new(config: AdmissionConfig, now: Instant) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: now,
                last_seen: now,
                retired: false,
            }),
            config,
            total_admitted: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            total_refills: AtomicU64::new(0),
        })
    }

    /// Refills from elapsed time, then tries to take one token.
    ///
    /// The whole computation runs under the bucket lock, so a burst of calls
    /// at the same instant refills at most once and never admits more than
    /// the tokens actually present.
    pub fn try_consume(&self, now: Instant) -> AdmissionResult {
        let mut state = self.state.lock();
        self.consume_locked(&mut state, now)
    }

    /// Like [`try_consume`](Self::try_consume), but returns `None` once the
    /// bucket has been retired by the eviction sweep.
    pub(crate) fn try_consume_live(&self, now: Instant) -> Option<AdmissionResult> {
        let mut state = self.state.lock();
        if state.retired {
            return None;
        }
        Some(self.consume_locked(&mut state, now))
    }

    fn consume_locked(&self, state: &mut BucketState, now: Instant) -> AdmissionResult {
        if now > state.last_seen {
            state.last_seen = now;
        }

        self.refill(state, now);

        if state.tokens >= 1 {
            state.tokens -= 1;
            self.total_admitted.fetch_add(1, Ordering::Relaxed);
            AdmissionResult::admitted(state.tokens, self.config.capacity)
        } else {
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
            AdmissionResult::rejected(self.config.capacity, self.retry_after(state, now))
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);

        if let Some(gap) = self.config.stale_gap {
            if elapsed < gap {
                return;
            }
        }

        let tokens_to_add = whole_tokens(elapsed, self.config.refill_rate);
        if tokens_to_add == 0 {
            // Leave last_refill alone so the partial token keeps accruing.
            return;
        }

        let before = state.tokens;
        state.tokens = state
            .tokens
            .saturating_add(tokens_to_add)
            .min(self.config.capacity);
        state.last_refill = now;
        self.total_refills.fetch_add(1, Ordering::Relaxed);

        debug!(
            added = state.tokens - before,
            tokens = state.tokens,
            capacity = self.config.capacity,
            "refilled bucket"
        );
    }

    /// Time until a call would find a whole token, given an empty bucket.
    fn retry_after(&self, state: &BucketState, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let wait = match self.config.stale_gap {
            Some(gap) => self.config.token_interval().max(gap),
            None => self.config.token_interval(),
        };
        wait.saturating_sub(elapsed)
    }

    /// Marks the bucket retired if nothing has touched it for `threshold`.
    ///
    /// Returns `true` if the bucket is (now) retired.
    pub(crate) fn retire_if_idle(&self, now: Instant, threshold: Duration) -> bool {
        let mut state = self.state.lock();
        if now.saturating_duration_since(state.last_seen) >= threshold {
            state.retired = true;
        }
        state.retired
    }

    /// Unconditionally retires the bucket.
    pub(crate) fn retire(&self) {
        self.state.lock().retired = true;
    }

    /// Returns the configuration this bucket was created with.
    #[inline]
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Returns the bucket capacity.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.config.capacity
    }

    /// Returns the tokens currently held, without refilling.
    pub fn available_tokens(&self) -> u64 {
        self.state.lock().tokens
    }

    /// Returns `true` if nothing has touched the bucket for at least
    /// `threshold` as of `now`.
    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        let state = self.state.lock();
        now.saturating_duration_since(state.last_seen) >= threshold
    }

    /// Returns a snapshot of the bucket's counters.
    pub fn metrics(&self) -> BucketMetrics {
        BucketMetrics {
            total_admitted: self.total_admitted.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            total_refills: self.total_refills.load(Ordering::Relaxed),
            current_tokens: self.available_tokens(),
            capacity: self.config.capacity,
        }
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("TokenBucket");
        s.field("capacity", &self.config.capacity)
            .field("refill_rate", &self.config.refill_rate)
            .field("stale_gap", &self.config.stale_gap);
        // Never block in Debug; the caller may already hold the lock.
        match self.state.try_lock() {
            Some(state) => s.field("tokens", &state.tokens),
            None => s.field("tokens", &"<locked>"),
        };
        s.finish()
    }
}

/// `floor(elapsed * rate)`, computed in integer nanoseconds.
#[inline]
fn whole_tokens(elapsed: Duration, rate: u64) -> u64 {
    let scaled = elapsed.as_nanos().saturating_mul(u128::from(rate)) / NANOS_PER_SEC;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    fn bucket(capacity: u64, rate: u64, t0: Instant) -> TokenBucket {
        TokenBucket::new(AdmissionConfig::new(capacity, rate), t0).unwrap()
    }

    fn drain(bucket: &TokenBucket, now: Instant) {
        while bucket.try_consume(now).admitted {}
    }

    #[test]
    fn test_documented_scenario() {
        let t0 = Instant::now();
        let bucket = bucket(2, 2, t0);

        let first = bucket.try_consume(t0);
        assert!(first.admitted);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.limit, 2);

        let second = bucket.try_consume(t0);
        assert!(second.admitted);
        assert_eq!(second.remaining, 0);

        let third = bucket.try_consume(t0);
        assert!(!third.admitted);
        assert_eq!(third.remaining, 0);

        let fourth = bucket.try_consume(t0 + Duration::from_secs(1));
        assert!(fourth.admitted);
        assert_eq!(fourth.remaining, 1);
    }

    #[test]
    fn test_capacity_calls_at_one_instant() {
        let t0 = Instant::now();
        let bucket = bucket(10, 1, t0);

        for i in 0..10 {
            let result = bucket.try_consume(t0);
            assert!(result.admitted);
            assert_eq!(result.remaining, 9 - i);
        }
        assert!(!bucket.try_consume(t0).admitted);
    }

    #[test]
    fn test_refill_after_whole_tokens() {
        let t0 = Instant::now();
        for n in 1..=8u64 {
            let bucket = bucket(5, 4, t0);
            drain(&bucket, t0);

            // n tokens' worth of time at 4 tokens/s
            let later = t0 + Duration::from_millis(250 * n);
            let result = bucket.try_consume(later);
            assert!(result.admitted, "n = {}", n);
            assert_eq!(result.remaining, n.min(5) - 1, "n = {}", n);
        }
    }

    #[test]
    fn test_fractional_progress_carries_over() {
        let t0 = Instant::now();
        let bucket = bucket(3, 1, t0);
        drain(&bucket, t0);

        // 0.6s: no whole token yet, last_refill must not move
        assert!(!bucket.try_consume(t0 + Duration::from_millis(600)).admitted);
        // 1.2s since the last refill: one token
        let result = bucket.try_consume(t0 + Duration::from_millis(1200));
        assert!(result.admitted);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_fraction_dropped_after_refill() {
        let t0 = Instant::now();
        let bucket = bucket(5, 1, t0);
        drain(&bucket, t0);

        // 1.9s refills 1 token and moves last_refill to t0 + 1.9s
        assert!(bucket.try_consume(t0 + Duration::from_millis(1900)).admitted);
        // 2.5s is only 0.6s past the last refill
        assert!(!bucket.try_consume(t0 + Duration::from_millis(2500)).admitted);
        assert!(bucket.try_consume(t0 + Duration::from_millis(2900)).admitted);
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let t0 = Instant::now();
        let bucket = bucket(3, 100, t0);
        drain(&bucket, t0);

        let result = bucket.try_consume(t0 + Duration::from_secs(3600));
        assert!(result.admitted);
        assert_eq!(result.remaining, 2);
        assert_eq!(bucket.available_tokens(), 2);
    }

    #[test]
    fn test_sub_second_precision() {
        let t0 = Instant::now();
        let bucket = bucket(1000, 1000, t0);
        drain(&bucket, t0);

        // 10ms at 1000 tokens/s is 10 tokens
        let result = bucket.try_consume(t0 + Duration::from_millis(10));
        assert!(result.admitted);
        assert_eq!(result.remaining, 9);
    }

    #[test]
    fn test_clock_going_backwards() {
        let t1 = Instant::now() + Duration::from_secs(10);
        let bucket = bucket(2, 1, t1);
        drain(&bucket, t1);

        let earlier = t1 - Duration::from_secs(5);
        let result = bucket.try_consume(earlier);
        assert!(!result.admitted);
        assert_eq!(bucket.available_tokens(), 0);

        // last_refill is still t1: one second after t1 yields one token
        let result = bucket.try_consume(t1 + Duration::from_secs(1));
        assert!(result.admitted);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_stale_gap_skips_refill() {
        let t0 = Instant::now();
        let config = AdmissionConfig::new(5, 10).with_stale_gap(Duration::from_millis(500));
        let bucket = TokenBucket::new(config, t0).unwrap();
        drain(&bucket, t0);

        // 300ms would be 3 tokens, but it is below the gap
        assert!(!bucket.try_consume(t0 + Duration::from_millis(300)).admitted);
        assert_eq!(bucket.metrics().total_refills, 0);

        // At the gap the full elapsed time counts
        let result = bucket.try_consume(t0 + Duration::from_millis(500));
        assert!(result.admitted);
        assert_eq!(result.remaining, 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let t0 = Instant::now();
        assert!(TokenBucket::new(AdmissionConfig::new(0, 1), t0).is_err());
        assert!(TokenBucket::new(AdmissionConfig::new(1, 0), t0).is_err());
    }

    #[test]
    fn test_same_instant_refills_once() {
        let t0 = Instant::now();
        let bucket = bucket(4, 1, t0);
        drain(&bucket, t0);

        let t1 = t0 + Duration::from_secs(2);
        assert!(bucket.try_consume(t1).admitted);
        assert!(bucket.try_consume(t1).admitted);
        assert!(!bucket.try_consume(t1).admitted);
        assert_eq!(bucket.metrics().total_refills, 1);
    }

    #[test]
    fn test_tokens_stay_within_bounds() {
        let t0 = Instant::now();
        let bucket = bucket(7, 3, t0);

        // Deterministic mix of bursts, gaps and a backwards step
        let offsets_ms: [u64; 16] = [
            0, 0, 0, 10, 400, 400, 399, 2000, 2001, 2002, 9000, 100, 9300, 9300, 12000, 12000,
        ];
        for (i, ms) in offsets_ms.iter().enumerate() {
            for _ in 0..(i % 4 + 1) {
                let result = bucket.try_consume(t0 + Duration::from_millis(*ms));
                assert!(result.remaining <= 7);
            }
            let tokens = bucket.available_tokens();
            assert!(tokens <= 7, "tokens {} exceeded capacity", tokens);
        }
    }

    #[test]
    fn test_retry_after() {
        let t0 = Instant::now();
        let bucket = bucket(1, 4, t0);
        assert!(bucket.try_consume(t0).admitted);

        let rejected = bucket.try_consume(t0 + Duration::from_millis(100));
        assert!(!rejected.admitted);
        assert_eq!(rejected.retry_after, Duration::from_millis(150));

        let config = AdmissionConfig::new(1, 4).with_stale_gap(Duration::from_secs(1));
        let gapped = TokenBucket::new(config, t0).unwrap();
        assert!(gapped.try_consume(t0).admitted);
        let rejected = gapped.try_consume(t0 + Duration::from_millis(100));
        assert_eq!(rejected.retry_after, Duration::from_millis(900));
    }

    #[test]
    fn test_concurrent_burst_never_exceeds_capacity() {
        let t0 = Instant::now();
        let bucket = Arc::new(bucket(100, 1, t0));
        let admitted = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let bucket = bucket.clone();
            let admitted = admitted.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    if bucket.try_consume(t0).admitted {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::Relaxed), 100);
        assert_eq!(bucket.available_tokens(), 0);

        let metrics = bucket.metrics();
        assert_eq!(metrics.total_admitted, 100);
        assert_eq!(metrics.total_rejected, 300);
    }

    #[test]
    fn test_retire_if_idle() {
        let t0 = Instant::now();
        let bucket = bucket(2, 1, t0);
        bucket.try_consume(t0 + Duration::from_secs(1));

        assert!(!bucket.retire_if_idle(t0 + Duration::from_secs(2), Duration::from_secs(5)));
        assert!(bucket.try_consume_live(t0 + Duration::from_secs(2)).is_some());

        assert!(bucket.retire_if_idle(t0 + Duration::from_secs(8), Duration::from_secs(5)));
        assert!(bucket.try_consume_live(t0 + Duration::from_secs(8)).is_none());
    }

    #[test]
    fn test_is_idle_tracks_latest_check() {
        let t0 = Instant::now();
        let bucket = bucket(2, 1, t0);
        bucket.try_consume(t0 + Duration::from_secs(10));
        // An out-of-order earlier timestamp must not rewind last_seen
        bucket.try_consume(t0 + Duration::from_secs(3));

        assert!(!bucket.is_idle(t0 + Duration::from_secs(12), Duration::from_secs(5)));
        assert!(bucket.is_idle(t0 + Duration::from_secs(15), Duration::from_secs(5)));
    }

    #[test]
    fn test_whole_tokens_saturates() {
        assert_eq!(whole_tokens(Duration::MAX, u64::MAX), u64::MAX);
        assert_eq!(whole_tokens(Duration::from_millis(999), 1), 0);
        assert_eq!(whole_tokens(Duration::from_millis(1500), 2), 3);
    }

    #[test]
    fn test_debug_impl() {
        let bucket = bucket(10, 5, Instant::now());
        let debug_str = format!("{:?}", bucket);

        assert!(debug_str.contains("TokenBucket"));
        assert!(debug_str.contains("capacity: 10"));
        assert!(debug_str.contains("refill_rate: 5"));
        assert!(debug_str.contains("tokens: 10"));
    }
}
