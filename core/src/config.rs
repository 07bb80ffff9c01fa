//! Default retry behaviour, optionally loaded from TOML
//!
//! ```toml
//! max_retries = 5
//! base_delay_ms = 250
//! show_notification = false
//! ```

use crate::backoff::ExponentialBackoff;
use crate::error::ConfigError;

/// Defaults applied by [`NetworkResilience`](crate::NetworkResilience)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct ResilienceConfig {
    /// Maximum executions of an operation, including the first
    pub max_retries: u32,
    /// Delay after the first failure in milliseconds
    pub base_delay_ms: u64,
    /// Optional cap on any single delay
    pub max_delay_ms: Option<u64>,
    /// Jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub jitter_factor: f64,
    /// Emit user-facing notices on unrecoverable network failures
    pub show_notification: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: None,
            jitter_factor: 0.0,
            show_notification: true,
        }
    }
}

impl ResilienceConfig {
    /// Parse and validate a TOML document
    #[cfg(feature = "config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::JitterOutOfRange(self.jitter_factor));
        }
        Ok(())
    }

    /// Backoff described by this configuration
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new()
            .max_attempts(self.max_retries)
            .base_delay_ms(self.base_delay_ms)
            .max_delay_ms(self.max_delay_ms.unwrap_or(u64::MAX))
            .jitter_factor(self.jitter_factor)
    }
}
