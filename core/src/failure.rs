//! Failure descriptors and network classification
//!
//! Errors are classified through an explicit [`FailureDescriptor`] rather
//! than by poking at arbitrary error shapes. Anything that can produce a
//! descriptor via [`Describe`] can be retried by this crate.

use std::io;

const NETWORK_ERROR_MARKER: &str = "Network Error";
const FETCH_MARKER: &str = "fetch";
const NETWORK_ERROR_CODE: &str = "ERR_NETWORK";

/// Coarse origin of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureKind {
    /// Transport-level failure raised by an HTTP client or socket layer
    Transport,
    /// Anything else
    #[default]
    Other,
}

/// Structured view of a failure used for classification
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailureDescriptor {
    pub message: String,
    pub code: Option<String>,
    pub kind: FailureKind,
}

impl FailureDescriptor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind: FailureKind::Other,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shorthand for a transport failure
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(FailureKind::Transport)
    }

    /// Whether the descriptor alone looks like a network failure
    ///
    /// Ignores connectivity; see [`is_network_failure`] for the full rule.
    pub fn matches_network_pattern(&self) -> bool {
        self.message.contains(NETWORK_ERROR_MARKER)
            || self.message.contains(FETCH_MARKER)
            || self.code.as_deref() == Some(NETWORK_ERROR_CODE)
            || self.kind == FailureKind::Transport
    }
}

/// Produce a [`FailureDescriptor`] for an error value
pub trait Describe {
    fn describe(&self) -> FailureDescriptor;
}

impl Describe for FailureDescriptor {
    fn describe(&self) -> FailureDescriptor {
        self.clone()
    }
}

impl Describe for str {
    fn describe(&self) -> FailureDescriptor {
        FailureDescriptor::new(self)
    }
}

impl Describe for String {
    fn describe(&self) -> FailureDescriptor {
        FailureDescriptor::new(self.as_str())
    }
}

impl<T: Describe + ?Sized> Describe for &T {
    fn describe(&self) -> FailureDescriptor {
        (**self).describe()
    }
}

impl Describe for io::Error {
    fn describe(&self) -> FailureDescriptor {
        let kind = match self.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::NetworkDown => FailureKind::Transport,
            _ => FailureKind::Other,
        };
        FailureDescriptor::new(self.to_string()).with_kind(kind)
    }
}

/// Where a failure lands in the resilience taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network-classified; retried, then substituted or propagated
    TransientNetwork,
    /// Not network related; never retried
    NonTransient,
    /// Connectivity was offline before the operation ran
    OfflineShortCircuit,
}

/// Network classification rule
///
/// True when the descriptor matches a known transport pattern, or when
/// the host is currently offline.
pub fn is_network_failure(failure: &FailureDescriptor, online: bool) -> bool {
    !online || failure.matches_network_pattern()
}

/// Classify an attempt failure as transient or not
pub fn classify(failure: &FailureDescriptor, online: bool) -> FailureClass {
    if is_network_failure(failure, online) {
        FailureClass::TransientNetwork
    } else {
        FailureClass::NonTransient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_markers() {
        assert!(is_network_failure(&FailureDescriptor::new("Network Error"), true));
        assert!(is_network_failure(
            &FailureDescriptor::new("Failed to fetch resource"),
            true
        ));
        assert!(!is_network_failure(&FailureDescriptor::new("network error"), true));
        assert!(!is_network_failure(&FailureDescriptor::new("Validation failed"), true));
    }

    #[test]
    fn test_code_and_kind() {
        let by_code = FailureDescriptor::new("boom").with_code("ERR_NETWORK");
        assert!(is_network_failure(&by_code, true));

        let other_code = FailureDescriptor::new("boom").with_code("ERR_BAD_REQUEST");
        assert!(!is_network_failure(&other_code, true));

        assert!(is_network_failure(&FailureDescriptor::transport("boom"), true));
    }

    #[test]
    fn test_offline_classifies_everything() {
        let failure = FailureDescriptor::new("Validation failed");
        assert!(is_network_failure(&failure, false));
        assert_eq!(classify(&failure, false), FailureClass::TransientNetwork);
        assert_eq!(classify(&failure, true), FailureClass::NonTransient);
    }

    #[test]
    fn test_io_error_kinds() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(refused.describe().kind, FailureKind::Transport);

        let missing = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let descriptor = missing.describe();
        assert_eq!(descriptor.kind, FailureKind::Other);
        assert_eq!(descriptor.message, "no such file");
    }

    #[test]
    fn test_str_and_string_describe() {
        assert_eq!("Network Error".describe().message, "Network Error");
        assert_eq!(String::from("x").describe(), FailureDescriptor::new("x"));
    }
}
