//! # Tollbooth - Per-Client Admission Control
//!
//! A token-bucket rate limiter keyed by client identity, meant to sit in
//! front of a request handler. Each client gets its own bucket; every request
//! asks that bucket for one token, and requests that find the bucket empty
//! are rejected with enough metadata for the caller to signal backpressure.
//!
//! ## The Token Bucket Algorithm
//!
//! ```text
//!     capacity = 5, refill_rate = 5/s
//!
//!     t = 0.0s   [🪙🪙🪙🪙🪙]  starts full
//!     request    [🪙🪙🪙🪙]    ✅ takes 1
//!     request    [🪙🪙🪙]      ✅ takes 1
//!     t = 0.4s   [🪙🪙🪙🪙🪙]  +2 (capped at capacity)
//! ```
//!
//! - **Capacity** = largest burst a client may send
//! - **Refill rate** = sustained requests per second
//! - **Stale gap** = optional minimum elapsed time before a refill is computed
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//! use tollbooth::{client_identity, AdmissionConfig, LimiterRegistry};
//!
//! // Created once at startup, shared with every handler
//! let registry = Arc::new(LimiterRegistry::new());
//! let config = AdmissionConfig::new(2, 2);
//!
//! // In a request handler:
//! let identity = client_identity("192.168.1.100:52311");
//! let result = registry.check(&identity, &config, Instant::now())?;
//!
//! if result.admitted {
//!     // dispatch to the next handler
//! } else {
//!     // reply "too many requests", e.g. with result.metadata() as headers
//! }
//! # Ok::<(), tollbooth::AdmissionError>(())
//! ```
//!
//! ## Keeping Memory Bounded
//!
//! Buckets are created on first sight of a client. A sweeper thread removes
//! buckets that have been idle long enough to be full again:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tollbooth::{LimiterRegistry, RegistryConfig};
//!
//! let registry = Arc::new(LimiterRegistry::with_config(
//!     RegistryConfig::default().with_sweep_interval(Duration::from_secs(30)),
//! )?);
//! let sweeper = registry.clone().start_sweeper()?;
//! // ...
//! sweeper.stop();
//! # Ok::<(), tollbooth::AdmissionError>(())
//! ```
//!
//! ## Thread Safety
//!
//! - Lookup-or-create of a client's bucket is atomic, so concurrent first
//!   requests never produce two buckets.
//! - Refill-then-consume runs under a per-bucket lock, so a burst can never
//!   be admitted beyond the tokens actually present, and unrelated clients
//!   never contend with each other.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (bucket creation, refills, evictions,
//! sweeper lifecycle) and never installs a subscriber itself.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

// Internal module
mod admission;

// Public re-exports
pub use admission::{
    client_identity, AdmissionConfig, AdmissionError, AdmissionResult, BucketMetrics,
    LimiterRegistry, RegistryConfig, RegistrySlot, RegistryStats, Result, Sweeper, TokenBucket,
    LIMIT_KEY, REMAINING_KEY, RETRY_AFTER_KEY,
};

/// A registry wrapped in `Arc` for sharing across request handlers.
///
/// # Example
/// ```rust
/// use tollbooth::{AdmissionConfig, LimiterRegistry, SharedRegistry};
/// use std::sync::Arc;
///
/// let shared: SharedRegistry = Arc::new(LimiterRegistry::new());
///
/// let handler_copy = shared.clone();
/// std::thread::spawn(move || {
///     handler_copy.check_now("10.0.0.1", &AdmissionConfig::default())
/// })
/// .join()
/// .unwrap()
/// .unwrap();
/// ```
pub type SharedRegistry = std::sync::Arc<LimiterRegistry>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
///
/// ```rust
/// use tollbooth::prelude::*;
///
/// let registry = LimiterRegistry::new();
/// let config = AdmissionConfig::per_second(10);
/// ```
pub mod prelude {
    //! Common imports for request-handler integration.

    pub use crate::{
        client_identity, AdmissionConfig, AdmissionError, AdmissionResult, LimiterRegistry,
        RegistryConfig, RegistrySlot, SharedRegistry,
    };
}
