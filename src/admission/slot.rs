//! Single-initialization holder for a shared [`LimiterRegistry`].
//!
//! Request handlers that are wired up before the registry exists hold a
//! `RegistrySlot` instead. Checking through an empty slot is an error, never
//! a silent admit.

use super::{
    config::AdmissionConfig,
    decision::AdmissionResult,
    error::{AdmissionError, Result},
    registry::LimiterRegistry,
};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::info;

/// Holds the process's registry once it has been installed.
///
/// ```rust
/// use std::time::Instant;
/// use tollbooth::{AdmissionConfig, AdmissionError, LimiterRegistry, RegistrySlot};
///
/// let slot = RegistrySlot::new();
/// let config = AdmissionConfig::new(10, 1);
///
/// let early = slot.check("10.0.0.1", &config, Instant::now());
/// assert!(matches!(early, Err(AdmissionError::UninitializedRegistry)));
///
/// slot.init(LimiterRegistry::new()).unwrap();
/// assert!(slot.check("10.0.0.1", &config, Instant::now()).unwrap().admitted);
///
/// // Only the first installation counts
/// assert!(slot.init(LimiterRegistry::new()).is_err());
/// ```
#[derive(Debug, Default)]
pub struct RegistrySlot {
    registry: OnceLock<Arc<LimiterRegistry>>,
}

impl RegistrySlot {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self {
            registry: OnceLock::new(),
        }
    }

    /// Installs `registry` and returns a shared handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::AlreadyInitialized`] if a registry is
    /// already installed; the existing one is kept.
    pub fn init(&self, registry: LimiterRegistry) -> Result<Arc<LimiterRegistry>> {
        self.install(Arc::new(registry))
    }

    /// Installs an already shared registry.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::AlreadyInitialized`] if a registry is
    /// already installed.
    pub fn install(&self, registry: Arc<LimiterRegistry>) -> Result<Arc<LimiterRegistry>> {
        self.registry
            .set(Arc::clone(&registry))
            .map_err(|_| AdmissionError::AlreadyInitialized)?;
        info!("limiter registry initialized");
        Ok(registry)
    }

    /// Returns the installed registry.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::UninitializedRegistry`] if nothing has been
    /// installed yet.
    pub fn get(&self) -> Result<&Arc<LimiterRegistry>> {
        self.registry
            .get()
            .ok_or(AdmissionError::UninitializedRegistry)
    }

    /// Returns `true` once a registry is installed.
    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }

    /// [`LimiterRegistry::check`] through the installed registry.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::UninitializedRegistry`] before initialization,
    /// otherwise whatever the registry's check returns.
    pub fn check(
        &self,
        identity: &str,
        config: &AdmissionConfig,
        now: Instant,
    ) -> Result<AdmissionResult> {
        self.get()?.check(identity, config, now)
    }
}
