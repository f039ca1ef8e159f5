//! # Limiter Registry
//!
//! Owns one [`TokenBucket`] per client identity and creates buckets lazily
//! the first time an identity is seen.
//!
//! ```text
//!     Client identities:
//!     10.0.0.1 ──┐
//!     10.0.0.2 ──┼──► LimiterRegistry ──► one TokenBucket each
//!     10.0.0.3 ──┘         │
//!                          ▼
//!                   ┌──────────────┐
//!                   │   DashMap    │
//!                   │  id → bucket │  sharded, entry API
//!                   │  id → bucket │  for lookup-or-create
//!                   └──────────────┘
//! ```
//!
//! ## Locking
//!
//! - Lookup-or-create goes through the map's entry API, which holds the
//!   shard write lock across the check and the insert. Two first requests
//!   from the same client can never create two buckets.
//! - The map guard is dropped before the bucket lock is taken. The eviction
//!   sweep takes shard lock then bucket lock; nothing takes them the other
//!   way round.
//!
//! ## Eviction
//!
//! Buckets untouched for `idle_factor` full refill periods would be full
//! again, so dropping them changes no admission decision. [`evict_idle`]
//! removes them; [`start_sweeper`] runs it on a background thread. A bucket
//! is retired under its own lock before it leaves the map, and a caller that
//! still holds a retired bucket resolves again instead of consuming from it.
//!
//! [`evict_idle`]: LimiterRegistry::evict_idle
//! [`start_sweeper`]: LimiterRegistry::start_sweeper

use super::{
    bucket::TokenBucket,
    config::{AdmissionConfig, RegistryConfig},
    decision::AdmissionResult,
    error::Result,
    metrics::RegistryStats,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Registry of per-client token buckets.
///
/// Construct it once at startup and hand an `Arc` of it to every request
/// handler.
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Instant;
/// use tollbooth::{AdmissionConfig, LimiterRegistry};
///
/// let registry = Arc::new(LimiterRegistry::new());
/// let config = AdmissionConfig::new(2, 2);
/// let now = Instant::now();
///
/// assert!(registry.check("10.0.0.1", &config, now).unwrap().admitted);
/// assert!(registry.check("10.0.0.1", &config, now).unwrap().admitted);
/// assert!(!registry.check("10.0.0.1", &config, now).unwrap().admitted);
///
/// // Another client has its own budget
/// assert!(registry.check("10.0.0.2", &config, now).unwrap().admitted);
/// assert_eq!(registry.len(), 2);
/// ```
pub struct LimiterRegistry {
    buckets: DashMap<String, Arc<TokenBucket>, ahash::RandomState>,
    config: RegistryConfig,
    total_created: AtomicU64,
    total_evicted: AtomicU64,
}

impl LimiterRegistry {
    /// Creates an empty registry with the default [`RegistryConfig`].
    pub fn new() -> Self {
        Self::build(RegistryConfig::default())
    }

    /// Creates an empty registry with custom settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RegistryConfig) -> Self {
        // More shards = less contention but more memory overhead
        let num_shards = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(4, 64);

        Self {
            buckets: DashMap::with_capacity_and_hasher_and_shard_amount(
                config.initial_capacity,
                ahash::RandomState::new(),
                num_shards,
            ),
            config,
            total_created: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        }
    }

    /// Returns the bucket for `identity`, creating it if needed.
    ///
    /// A new bucket starts full with its refill clock at the current
    /// instant. `config` only matters the first time an identity is seen;
    /// an existing bucket keeps the configuration it was created with.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate, whether
    /// or not the bucket already exists.
    pub fn resolve(&self, identity: &str, config: &AdmissionConfig) -> Result<Arc<TokenBucket>> {
        self.resolve_at(identity, config, Instant::now())
    }

    /// Like [`resolve`](Self::resolve), stamping a new bucket with `now`.
    pub fn resolve_at(
        &self,
        identity: &str,
        config: &AdmissionConfig,
        now: Instant,
    ) -> Result<Arc<TokenBucket>> {
        config.validate()?;

        // Fast path: no allocation for identities we already track
        if let Some(entry) = self.buckets.get(identity) {
            let bucket = Arc::clone(entry.value());
            drop(entry);
            self.note_config_drift(identity, &bucket, config);
            return Ok(bucket);
        }

        match self.buckets.entry(identity.to_owned()) {
            Entry::Occupied(occupied) => {
                // Another caller created it between our lookup and the entry lock
                Ok(Arc::clone(occupied.get()))
            }
            Entry::Vacant(vacant) => {
                let bucket = Arc::new(TokenBucket::new(config.clone(), now)?);
                vacant.insert(Arc::clone(&bucket));

                let total = self.total_created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    identity,
                    capacity = config.capacity,
                    refill_rate = config.refill_rate,
                    total,
                    "created bucket"
                );
                Ok(bucket)
            }
        }
    }

    fn note_config_drift(&self, identity: &str, bucket: &TokenBucket, config: &AdmissionConfig) {
        if bucket.config() != config {
            debug!(
                identity,
                capacity = bucket.capacity(),
                requested_capacity = config.capacity,
                "keeping first configuration for existing bucket"
            );
        }
    }

    /// Admission check for one request from `identity` at `now`.
    ///
    /// Resolves (or creates) the client's bucket and tries to take one
    /// token from it. A rejection is `Ok` with `admitted == false`.
    ///
    /// # Errors
    ///
    /// Only configuration errors; see [`resolve`](Self::resolve).
    pub fn check(
        &self,
        identity: &str,
        config: &AdmissionConfig,
        now: Instant,
    ) -> Result<AdmissionResult> {
        loop {
            let bucket = self.resolve_at(identity, config, now)?;
            if let Some(result) = bucket.try_consume_live(now) {
                return Ok(result);
            }
            // Retired by a concurrent sweep, which drops it from the map
            // under the shard lock. Resolve again.
        }
    }

    /// [`check`](Self::check) at the current instant.
    pub fn check_now(&self, identity: &str, config: &AdmissionConfig) -> Result<AdmissionResult> {
        self.check(identity, config, Instant::now())
    }

    /// Returns the bucket for `identity` without creating one.
    pub fn get(&self, identity: &str) -> Option<Arc<TokenBucket>> {
        self.buckets.get(identity).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes buckets that have been idle long enough to be full again.
    ///
    /// Returns the number of buckets removed. Runs off the request path;
    /// call it periodically or use [`start_sweeper`](Self::start_sweeper).
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut removed = 0usize;

        self.buckets.retain(|identity, bucket| {
            let threshold = self.config.idle_threshold(bucket.config());
            if bucket.retire_if_idle(now, threshold) {
                debug!(identity = identity.as_str(), "evicting idle bucket");
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.total_evicted
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = self.buckets.len(), "eviction sweep finished");
        }

        self.shrink_to_fit();
        removed
    }

    /// Shrinks the map if it has significant overcapacity.
    fn shrink_to_fit(&self) {
        let current = self.buckets.len();
        let capacity = self.buckets.capacity();

        if capacity > current.saturating_mul(4)
            && capacity > self.config.initial_capacity.max(1024)
        {
            self.buckets.shrink_to_fit();
            debug!(from = capacity, to = current, "shrunk bucket map");
        }
    }

    /// Removes every bucket.
    pub fn clear(&self) {
        let mut count = 0u64;
        self.buckets.retain(|_, bucket| {
            bucket.retire();
            count += 1;
            false
        });
        self.total_evicted.fetch_add(count, Ordering::Relaxed);
        info!(count, "cleared all buckets");
    }

    /// Number of buckets currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no buckets are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns the registry settings.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns population statistics.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_buckets: self.len(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
        }
    }

    /// Starts a background thread that runs [`evict_idle`](Self::evict_idle)
    /// every `sweep_interval`.
    ///
    /// The thread stops when the returned [`Sweeper`] is stopped or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::SweeperSpawn`](super::AdmissionError::SweeperSpawn)
    /// if the OS refuses to spawn the thread.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use tollbooth::LimiterRegistry;
    ///
    /// let registry = Arc::new(LimiterRegistry::new());
    /// let sweeper = registry.clone().start_sweeper().unwrap();
    ///
    /// // ... serve requests ...
    ///
    /// sweeper.stop();
    /// ```
    pub fn start_sweeper(self: Arc<Self>) -> Result<Sweeper> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let interval = self.config.sweep_interval;
        let registry = self;

        let handle = thread::Builder::new()
            .name("tollbooth-sweeper".to_string())
            .spawn(move || {
                info!(?interval, "started eviction sweeper");

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("eviction sweeper stopping");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            registry.evict_idle(Instant::now());
                        }
                    }
                }
            })?;

        Ok(Sweeper {
            handle: Some(handle),
            stop_tx,
        })
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterRegistry")
            .field("buckets", &self.len())
            .field("sweep_interval", &self.config.sweep_interval)
            .field("idle_factor", &self.config.idle_factor)
            .finish()
    }
}

/// Handle to a running eviction sweeper thread.
///
/// Dropping the handle stops the thread and waits for it to exit.
#[derive(Debug)]
pub struct Sweeper {
    handle: Option<thread::JoinHandle<()>>,
    stop_tx: mpsc::Sender<()>,
}

impl Sweeper {
    /// Signals the sweeper to stop and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Returns `true` while the sweeper thread is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    fn shutdown(&mut self) {
        // The thread may already be gone; a failed send is fine.
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("eviction sweeper panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
