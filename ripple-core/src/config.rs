//! Runtime Configuration
//!
//! The runtime works without any configuration. [`RuntimeConfig`] exists for
//! hosts that want to tune the flush driver, and can be loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for the process-wide runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times a single effect may run inside one flush before it is
    /// dropped from the queue and reported as
    /// [`ReactiveError::FlushLimitExceeded`](crate::ReactiveError::FlushLimitExceeded).
    pub max_reruns_per_flush: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_reruns_per_flush: 100,
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_reruns_per_flush == 0 {
            return Err(ConfigError::ZeroReruns);
        }
        Ok(())
    }
}
