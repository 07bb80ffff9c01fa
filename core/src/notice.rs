//! User-facing notices emitted on unrecoverable network failures
//!
//! How a notice reaches the user (toast, status bar, log line) is up to
//! the host; this crate only decides when one is due.

use std::fmt;

/// A notice for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The host was offline, the operation was skipped
    Offline,
    /// Retries against the network were exhausted
    ConnectionProblem,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::Offline => "You appear to be offline. Please check your internet connection.",
            Notice::ConnectionProblem => {
                "Connection problem. Please check your internet and try again."
            }
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Delivery channel for notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl<F> Notifier for F
where
    F: Fn(Notice) + Send + Sync,
{
    fn notify(&self, notice: Notice) {
        self(notice)
    }
}

/// Default notifier: logs the notice text
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::error!(?notice, "{}", notice.message());
    }
}
