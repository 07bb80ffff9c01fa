//! The network-resilience helper
//!
//! [`NetworkResilience`] ties classification, retry, connectivity and
//! notices together. It owns no global state: connectivity comes from the
//! injected [`ConnectivityMonitor`].

use crate::backoff::ExponentialBackoff;
use crate::config::ResilienceConfig;
use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::error::ResilienceError;
use crate::failure::{Describe, FailureClass, is_network_failure};
use crate::notice::{Notice, Notifier, TracingNotifier};
use crate::retry::RetryBuilder;
use crate::sleep::{Sleeper, TokioSleeper};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-call options for [`NetworkResilience::with_resilience`]
#[derive(Debug, Clone)]
pub struct ResilienceOptions<T> {
    show_notification: bool,
    backoff: ExponentialBackoff,
    fallback: Option<T>,
    cancellation: Option<CancellationToken>,
}

impl<T> Default for ResilienceOptions<T> {
    fn default() -> Self {
        Self {
            show_notification: true,
            backoff: ExponentialBackoff::default(),
            fallback: None,
            cancellation: None,
        }
    }
}

impl<T> ResilienceOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            show_notification: config.show_notification,
            backoff: config.backoff(),
            ..Self::default()
        }
    }

    /// Emit a user-facing notice on unrecoverable network failures
    pub fn show_notification(mut self, show: bool) -> Self {
        self.show_notification = show;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.backoff = self.backoff.max_attempts(max_retries);
        self
    }

    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.backoff = self.backoff.base_delay_ms(ms);
        self
    }

    /// Value returned instead of a network-classified failure
    pub fn fallback(mut self, value: T) -> Self {
        self.fallback = Some(value);
        self
    }

    /// Abandon the retry sequence when `token` is cancelled
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Retry, connectivity and notice handling for network-bound operations
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use net_resilience::{ConnectivityMonitor, ManualNetwork, NetworkResilience, ResilienceOptions};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let network = Arc::new(ManualNetwork::new(false));
/// let resilience = NetworkResilience::new(ConnectivityMonitor::new(network));
///
/// let products: Vec<String> = resilience
///     .with_resilience(
///         || async { Err::<Vec<String>, _>("Failed to fetch") },
///         ResilienceOptions::new().show_notification(false).fallback(Vec::new()),
///     )
///     .await
///     .unwrap();
///
/// assert!(products.is_empty());
/// # }
/// ```
#[derive(Clone)]
pub struct NetworkResilience {
    connectivity: ConnectivityMonitor,
    sleeper: Arc<dyn Sleeper>,
    notifier: Arc<dyn Notifier>,
    config: ResilienceConfig,
}

impl NetworkResilience {
    pub fn new(connectivity: ConnectivityMonitor) -> Self {
        Self {
            connectivity,
            sleeper: Arc::new(TokioSleeper),
            notifier: Arc::new(TracingNotifier),
            config: ResilienceConfig::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Whether `error` counts as a network failure right now
    pub fn is_network_error<E: Describe + ?Sized>(&self, error: &E) -> bool {
        is_network_failure(&error.describe(), self.is_online())
    }

    /// Subscribe to online/offline transitions
    pub fn observe_connectivity<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.connectivity.subscribe(on_change)
    }

    /// Start a retry sequence seeded with the configured backoff
    pub fn retry<F, Fut, T, E>(&self, operation: F) -> RetryBuilder<F, T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Describe,
    {
        RetryBuilder::new(
            operation,
            self.config.backoff(),
            self.connectivity.clone(),
            Arc::clone(&self.sleeper),
        )
    }

    /// Retry `operation` up to `max_retries` times, doubling the delay
    /// from `base_delay_ms` after each network failure
    pub async fn retry_with_backoff<F, Fut, T, E>(
        &self,
        operation: F,
        max_retries: u32,
        base_delay_ms: u64,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Describe,
    {
        self.retry(operation)
            .backoff(
                ExponentialBackoff::new()
                    .max_attempts(max_retries)
                    .base_delay_ms(base_delay_ms),
            )
            .call()
            .await
    }

    /// Options seeded from the configuration
    pub fn options<T>(&self) -> ResilienceOptions<T> {
        ResilienceOptions::from_config(&self.config)
    }

    /// Run `operation` with retries, notices and an optional fallback
    ///
    /// Offline at call time, the operation is skipped. Network-classified
    /// failures are replaced by the fallback when one is set; any other
    /// failure is returned as is.
    pub async fn with_resilience<F, Fut, T, E>(
        &self,
        operation: F,
        options: ResilienceOptions<T>,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Describe,
    {
        let ResilienceOptions {
            show_notification,
            backoff,
            fallback,
            cancellation,
        } = options;

        if !self.is_online() {
            tracing::warn!(
                class = ?FailureClass::OfflineShortCircuit,
                fallback = fallback.is_some(),
                "offline, operation skipped"
            );
            if show_notification {
                self.notifier.notify(Notice::Offline);
            }
            return fallback.ok_or(ResilienceError::Offline);
        }

        let builder = self.retry(operation).backoff(backoff);
        let result = match &cancellation {
            Some(token) => builder.call_until_cancelled(token).await,
            None => builder.call().await.map_err(ResilienceError::Operation),
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if let ResilienceError::Cancelled { attempts } = &error {
            tracing::debug!(attempts = *attempts, "operation cancelled");
            return Err(error);
        }

        let failure = error.describe();
        match error.class(self.is_online()) {
            FailureClass::TransientNetwork | FailureClass::OfflineShortCircuit => {
                tracing::error!(
                    class = ?FailureClass::TransientNetwork,
                    error = %failure.message,
                    fallback = fallback.is_some(),
                    "operation failed after retries"
                );
                if show_notification {
                    self.notifier.notify(Notice::ConnectionProblem);
                }
                fallback.ok_or(error)
            }
            FailureClass::NonTransient => {
                tracing::warn!(
                    class = ?FailureClass::NonTransient,
                    error = %failure.message,
                    "operation failed"
                );
                Err(error)
            }
        }
    }
}

impl fmt::Debug for NetworkResilience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkResilience")
            .field("connectivity", &self.connectivity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
