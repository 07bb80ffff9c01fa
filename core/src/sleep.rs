//! Sleep abstraction for the backoff delay
//!
//! The retry loop suspends only here, so swapping the sleeper is enough to
//! observe or fake the delays between attempts.

use async_trait::async_trait;
use std::time::Duration;

/// Trait for async sleep/delay implementations
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for the specified number of milliseconds
    async fn sleep_ms(&self, ms: u64);
}

/// Sleeper backed by `tokio::time::sleep`
///
/// Honors tokio's paused clock, so tests running with `start_paused`
/// advance through backoff delays instantly.
///
/// # Example
///
/// ```rust
/// use net_resilience::sleep::{Sleeper, TokioSleeper};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// TokioSleeper.sleep_ms(10).await;
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
