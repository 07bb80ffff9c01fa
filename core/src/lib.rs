//! net-resilience - network-aware retry for async operations
//!
//! This crate wraps fallible network calls with the small amount of
//! resilience a client-side application usually needs:
//!
//! - **Classification**: decides whether a failure is network related
//! - **Exponential backoff**: `base * 2^(attempt-1)` between attempts, no
//!   jitter unless asked for
//! - **Connectivity tracking**: mirrors the host's online/offline state,
//!   with cancellable subscriptions
//! - **Fallbacks and notices**: substitutes a value and tells the user when
//!   the network gives up, while application errors pass straight through
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use net_resilience::{ConnectivityMonitor, ManualNetwork, NetworkResilience};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let network = Arc::new(ManualNetwork::new(true));
//! let resilience = NetworkResilience::new(ConnectivityMonitor::new(network));
//!
//! let value = resilience
//!     .retry(|| async { Ok::<_, std::io::Error>(42) })
//!     .max_retries(3)
//!     .base_delay_ms(1000)
//!     .call()
//!     .await
//!     .unwrap();
//!
//! assert_eq!(value, 42);
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod failure;
pub mod notice;
pub mod resilience;
pub mod retry;
pub mod sleep;

pub use backoff::ExponentialBackoff;
pub use config::ResilienceConfig;
pub use connectivity::{
    ConnectivityEvent, ConnectivityMonitor, Listener, ListenerId, ManualNetwork,
    NetworkEnvironment, Subscription,
};
pub use error::{ConfigError, ResilienceError};
pub use failure::{
    Describe, FailureClass, FailureDescriptor, FailureKind, classify, is_network_failure,
};
pub use notice::{Notice, Notifier, TracingNotifier};
pub use resilience::{NetworkResilience, ResilienceOptions};
pub use retry::{RetryAttempt, RetryBuilder};
pub use sleep::{Sleeper, TokioSleeper};
pub use tokio_util::sync::CancellationToken;
