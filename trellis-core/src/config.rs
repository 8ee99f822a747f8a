//! Reconciler configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//!
//! ```rust
//! use trellis_core::ReconcilerConfig;
//!
//! let config = ReconcilerConfig::from_json(r#"{ "nested_update_limit": 10 }"#).unwrap();
//! assert_eq!(config.nested_update_limit, 10);
//! assert!(config.time_slice);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Emit development diagnostics (duplicate keys, dropped render-phase
    /// updates, updates to unmounted components).
    pub dev_warnings: bool,

    /// Consecutive commits a root may trigger from its own commit callbacks
    /// (refs, passive effects) before the reconciler gives up.
    pub nested_update_limit: u32,

    /// When `false`, concurrent lanes render to completion without polling
    /// the scheduler's yield signal.
    pub time_slice: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            dev_warnings: true,
            nested_update_limit: 50,
            time_slice: true,
        }
    }
}

impl ReconcilerConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nested_update_limit == 0 {
            return Err(ConfigError::ZeroNestedUpdateLimit);
        }
        Ok(())
    }

    pub fn with_dev_warnings(mut self, enabled: bool) -> Self {
        self.dev_warnings = enabled;
        self
    }

    pub fn with_nested_update_limit(mut self, limit: u32) -> Self {
        self.nested_update_limit = limit;
        self
    }

    pub fn with_time_slice(mut self, enabled: bool) -> Self {
        self.time_slice = enabled;
        self
    }
}
