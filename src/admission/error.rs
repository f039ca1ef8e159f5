//! # Admission Errors
//!
//! Everything that can go wrong in this crate is caller misuse: a malformed
//! configuration, a registry that was never installed, or an OS refusal to
//! spawn the maintenance thread. A throttled request is *not* an error; it is
//! an [`AdmissionResult`](super::AdmissionResult) with `admitted == false`.

use thiserror::Error;

/// Error type for admission-control operations.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// A configuration value is out of range.
    ///
    /// Raised before any bucket is created, so a malformed bucket never
    /// reaches the registry.
    #[error("invalid configuration: {field} {reason}")]
    Configuration {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// `check` was called through a [`RegistrySlot`](super::RegistrySlot)
    /// before the registry was installed.
    #[error("limiter registry used before initialization")]
    UninitializedRegistry,

    /// A [`RegistrySlot`](super::RegistrySlot) was initialized twice.
    #[error("limiter registry already initialized")]
    AlreadyInitialized,

    /// The background sweeper thread could not be spawned.
    #[error("failed to spawn eviction sweeper: {0}")]
    SweeperSpawn(#[from] std::io::Error),
}

impl AdmissionError {
    pub(crate) fn config(field: &'static str, reason: &'static str) -> Self {
        Self::Configuration { field, reason }
    }

    /// Returns `true` for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Result alias for admission-control operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;
