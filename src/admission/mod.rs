//! # Admission Module
//!
//! Internal implementation of per-client admission control.
//!
//! ## Module Structure
//!
//! ```text
//!     admission/
//!     ├── mod.rs       (module organization)
//!     ├── config.rs    (bucket and registry settings)
//!     ├── bucket.rs    (single-client token bucket)
//!     ├── registry.rs  (identity → bucket map, eviction sweep)
//!     ├── slot.rs      (single-initialization registry holder)
//!     ├── decision.rs  (admission outcome and its metadata)
//!     ├── identity.rs  (peer address → client key)
//!     ├── metrics.rs   (snapshots for monitoring)
//!     └── error.rs     (error taxonomy)
//! ```
//!
//! ## Flow
//!
//! ```text
//!     check(identity, config, now)
//!          │
//!          ▼
//!     ┌──────────┐
//!     │ Registry │ ◄── lookup-or-create, atomic per identity
//!     └────┬─────┘
//!          │
//!          ▼
//!     ┌──────────┐
//!     │  Bucket  │ ◄── refill + consume under the bucket lock
//!     └────┬─────┘
//!          │
//!          ▼
//!     AdmissionResult { admitted, remaining, limit, retry_after }
//! ```

mod bucket;
mod config;
mod decision;
mod error;
mod identity;
mod metrics;
mod registry;
mod slot;

/// Bucket and registry configuration
pub use config::{AdmissionConfig, RegistryConfig};

/// Single-client token bucket
pub use bucket::TokenBucket;

/// Identity → bucket registry and its background sweeper
pub use registry::{LimiterRegistry, Sweeper};

/// Single-initialization registry holder
pub use slot::RegistrySlot;

/// Admission outcome and metadata keys
pub use decision::{AdmissionResult, LIMIT_KEY, REMAINING_KEY, RETRY_AFTER_KEY};

/// Peer address → client key
pub use identity::client_identity;

/// Monitoring snapshots
pub use metrics::{BucketMetrics, RegistryStats};

/// Error taxonomy
pub use error::{AdmissionError, Result};
