use crate::failure::{Describe, FailureClass, FailureDescriptor, FailureKind};
use thiserror::Error;

/// Message carried by the offline short-circuit
pub const OFFLINE_MESSAGE: &str = "Network Error: You appear to be offline";

/// Failure returned by the resilience wrappers
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// Connectivity was offline at call time; the operation never ran
    #[error("{}", OFFLINE_MESSAGE)]
    Offline,

    /// The retry sequence was abandoned through its cancellation token
    #[error("retry sequence cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    /// The operation's own failure, unchanged
    #[error("{0}")]
    Operation(E),
}

impl<E> ResilienceError<E> {
    /// The operation's failure, if that is what this is
    pub fn into_operation(self) -> Option<E> {
        match self {
            ResilienceError::Operation(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, ResilienceError::Offline)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled { .. })
    }
}

impl<E: Describe> ResilienceError<E> {
    /// Taxonomy entry for this failure given the current connectivity
    ///
    /// Cancellation is reported as non-transient: it is never retried or
    /// substituted.
    pub fn class(&self, online: bool) -> FailureClass {
        match self {
            ResilienceError::Offline => FailureClass::OfflineShortCircuit,
            ResilienceError::Cancelled { .. } => FailureClass::NonTransient,
            ResilienceError::Operation(error) => {
                crate::failure::classify(&error.describe(), online)
            }
        }
    }
}

impl<E: Describe> Describe for ResilienceError<E> {
    fn describe(&self) -> FailureDescriptor {
        match self {
            ResilienceError::Offline => FailureDescriptor::new(OFFLINE_MESSAGE)
                .with_code("ERR_NETWORK")
                .with_kind(FailureKind::Transport),
            ResilienceError::Cancelled { attempts } => {
                FailureDescriptor::new(format!("retry sequence cancelled after {attempts} attempt(s)"))
            }
            ResilienceError::Operation(error) => error.describe(),
        }
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[cfg(feature = "config")]
    #[error("invalid resilience config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("max_retries must be at least 1")]
    ZeroRetries,

    #[error("jitter_factor must be within 0.0..=1.0, got {0}")]
    JitterOutOfRange(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_describes_as_network() {
        let error: ResilienceError<String> = ResilienceError::Offline;
        let descriptor = error.describe();

        assert!(descriptor.matches_network_pattern());
        assert_eq!(error.to_string(), OFFLINE_MESSAGE);
        assert_eq!(error.class(false), FailureClass::OfflineShortCircuit);
    }

    #[test]
    fn test_operation_is_transparent() {
        let error = ResilienceError::Operation(String::from("Validation failed"));

        assert_eq!(error.to_string(), "Validation failed");
        assert_eq!(error.class(true), FailureClass::NonTransient);
        assert_eq!(error.into_operation().as_deref(), Some("Validation failed"));
    }

    #[test]
    fn test_cancelled() {
        let error: ResilienceError<String> = ResilienceError::Cancelled { attempts: 2 };

        assert!(error.is_cancelled());
        assert!(!error.describe().matches_network_pattern());
        assert_eq!(error.to_string(), "retry sequence cancelled after 2 attempt(s)");
    }
}
