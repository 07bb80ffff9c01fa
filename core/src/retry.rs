//! Retry with exponential backoff
//!
//! This module provides a fluent retry API for wrapping fallible async
//! operations. Only network-classified failures are retried; anything else
//! is returned on the spot.

use crate::backoff::ExponentialBackoff;
use crate::connectivity::ConnectivityMonitor;
use crate::error::ResilienceError;
use crate::failure::{Describe, is_network_failure};
use crate::sleep::Sleeper;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A failed attempt that is about to be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-indexed number of the attempt that failed
    pub number: u32,
    /// Delay in milliseconds before the next attempt
    pub delay_ms: u64,
}

type RetryObserver<E> = Box<dyn FnMut(&E, &RetryAttempt) + Send>;

enum Stop<E, X> {
    Failed(E),
    Interrupted { signal: X, attempts: u32 },
}

/// Builder for configuring and executing a retry sequence
///
/// Created by [`NetworkResilience::retry`](crate::NetworkResilience::retry).
///
/// # Type Parameters
///
/// * `F` - The operation factory, called once per attempt
/// * `T` - The success return type
/// * `E` - The error type
pub struct RetryBuilder<F, T, E> {
    operation: F,
    backoff: ExponentialBackoff,
    connectivity: ConnectivityMonitor,
    sleeper: Arc<dyn Sleeper>,
    notify: Option<RetryObserver<E>>,
    _phantom_t: PhantomData<fn() -> T>,
}

impl<F, Fut, T, E> RetryBuilder<F, T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Describe,
{
    pub(crate) fn new(
        operation: F,
        backoff: ExponentialBackoff,
        connectivity: ConnectivityMonitor,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            operation,
            backoff,
            connectivity,
            sleeper,
            notify: None,
            _phantom_t: PhantomData,
        }
    }

    /// Maximum number of executions of the operation (at least 1)
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.backoff = self.backoff.max_attempts(max_retries);
        self
    }

    /// Delay after the first failure; doubles after each further failure
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.backoff = self.backoff.base_delay_ms(ms);
        self
    }

    /// Replace the backoff configuration wholesale
    pub fn backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Add a callback that's invoked before each retry
    ///
    /// The callback receives the error that triggered the retry and the
    /// attempt that produced it.
    pub fn notify<N>(mut self, callback: N) -> Self
    where
        N: FnMut(&E, &RetryAttempt) + Send + 'static,
    {
        self.notify = Some(Box::new(callback));
        self
    }

    /// Run the sequence to completion
    ///
    /// Returns the first success, or the last failure unchanged.
    pub async fn call(self) -> Result<T, E> {
        match self.run(std::future::pending::<Infallible>()).await {
            Ok(value) => Ok(value),
            Err(Stop::Failed(error)) => Err(error),
            Err(Stop::Interrupted { signal, .. }) => match signal {},
        }
    }

    /// Run the sequence until it completes or `token` is cancelled
    ///
    /// Cancellation is observed before each attempt, while an attempt is
    /// in flight and during the backoff sleep. Once observed, the operation
    /// is not invoked again.
    pub async fn call_until_cancelled(
        self,
        token: &CancellationToken,
    ) -> Result<T, ResilienceError<E>> {
        match self.run(token.cancelled()).await {
            Ok(value) => Ok(value),
            Err(Stop::Failed(error)) => Err(ResilienceError::Operation(error)),
            Err(Stop::Interrupted { attempts, .. }) => {
                tracing::debug!(attempts, "retry sequence cancelled");
                Err(ResilienceError::Cancelled { attempts })
            }
        }
    }

    async fn run<X>(mut self, interrupt: impl Future<Output = X>) -> Result<T, Stop<E, X>> {
        tokio::pin!(interrupt);
        let mut rng = SmallRng::from_os_rng();
        let mut attempt = 1u32;

        loop {
            tokio::select! {
                biased;
                signal = &mut interrupt => {
                    return Err(Stop::Interrupted { signal, attempts: attempt - 1 });
                }
                _ = std::future::ready(()) => {}
            }

            let outcome = tokio::select! {
                biased;
                signal = &mut interrupt => {
                    return Err(Stop::Interrupted { signal, attempts: attempt });
                }
                outcome = (self.operation)() => outcome,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let failure = error.describe();
            tracing::warn!(
                attempt,
                max_retries = self.backoff.max_attempts,
                error = %failure.message,
                "attempt failed"
            );

            if !is_network_failure(&failure, self.connectivity.is_online()) {
                return Err(Stop::Failed(error));
            }

            let Some(delay_ms) = self.backoff.delay(attempt, &mut rng) else {
                return Err(Stop::Failed(error));
            };

            if let Some(notify) = self.notify.as_mut() {
                notify(&error, &RetryAttempt { number: attempt, delay_ms });
            }

            tracing::debug!(attempt, delay_ms, "retrying after backoff");
            tokio::select! {
                biased;
                signal = &mut interrupt => {
                    return Err(Stop::Interrupted { signal, attempts: attempt });
                }
                _ = self.sleeper.sleep_ms(delay_ms) => {}
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ManualNetwork;
    use crate::failure::FailureDescriptor;
    use crate::sleep::TokioSleeper;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Network,
        Fatal,
    }

    impl Describe for TestError {
        fn describe(&self) -> FailureDescriptor {
            match self {
                TestError::Network => FailureDescriptor::new("Network Error"),
                TestError::Fatal => FailureDescriptor::new("validation failed"),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSleeper(Arc<Mutex<Vec<u64>>>);

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep_ms(&self, ms: u64) {
            self.0.lock().push(ms);
        }
    }

    fn online() -> (Arc<ManualNetwork>, ConnectivityMonitor) {
        let network = Arc::new(ManualNetwork::new(true));
        let monitor = ConnectivityMonitor::new(network.clone());
        (network, monitor)
    }

    fn builder<F, Fut, T>(
        operation: F,
        sleeper: Arc<dyn Sleeper>,
    ) -> RetryBuilder<F, T, TestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TestError>>,
    {
        let (_, monitor) = online();
        RetryBuilder::new(operation, ExponentialBackoff::default(), monitor, sleeper)
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let sleeper = RecordingSleeper::default();
        let result = builder(|| async { Ok::<_, TestError>(42) }, Arc::new(sleeper.clone()))
            .call()
            .await;

        assert_eq!(result, Ok(42));
        assert!(sleeper.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_non_network_failure_runs_once() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();

        let result = builder(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Fatal) }
            },
            Arc::new(sleeper.clone()),
        )
        .call()
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_exhausts_with_exponential_delays() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();

        let result = builder(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Network) }
            },
            Arc::new(sleeper.clone()),
        )
        .max_retries(5)
        .base_delay_ms(100)
        .call()
        .await;

        assert_eq!(result, Err(TestError::Network));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(*sleeper.0.lock(), vec![100, 200, 400, 800]);
    }

    #[tokio::test]
    async fn test_success_after_network_failure() {
        let calls = AtomicU32::new(0);

        let result = builder(
            || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call < 2 {
                        Err(TestError::Network)
                    } else {
                        Ok("payload")
                    }
                }
            },
            Arc::new(RecordingSleeper::default()),
        )
        .call()
        .await;

        assert_eq!(result, Ok("payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_network_then_fatal_stops_early() {
        let calls = AtomicU32::new(0);

        let result = builder(
            || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call == 1 {
                        Err::<(), _>(TestError::Network)
                    } else {
                        Err(TestError::Fatal)
                    }
                }
            },
            Arc::new(RecordingSleeper::default()),
        )
        .max_retries(4)
        .call()
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_offline_makes_any_failure_retryable() {
        let network = Arc::new(ManualNetwork::new(false));
        let monitor = ConnectivityMonitor::new(network.clone());
        let calls = AtomicU32::new(0);

        let result = RetryBuilder::new(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Fatal) }
            },
            ExponentialBackoff::default(),
            monitor,
            Arc::new(RecordingSleeper::default()),
        )
        .call()
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_notify_receives_attempts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let _ = builder(
            || async { Err::<(), _>(TestError::Network) },
            Arc::new(RecordingSleeper::default()),
        )
        .notify(move |_, attempt| sink.lock().push(*attempt))
        .call()
        .await;

        assert_eq!(
            *seen.lock(),
            vec![
                RetryAttempt { number: 1, delay_ms: 1000 },
                RetryAttempt { number: 2, delay_ms: 2000 },
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_max_retries_runs_once() {
        let calls = AtomicU32::new(0);

        let result = builder(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Network) }
            },
            Arc::new(RecordingSleeper::default()),
        )
        .max_retries(0)
        .call()
        .await;

        assert_eq!(result, Err(TestError::Network));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_real_sleeps_between_attempts() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let origin = Instant::now();

        let result = builder(
            || {
                started.lock().push(origin.elapsed());
                async { Err::<(), _>(TestError::Network) }
            },
            Arc::new(TokioSleeper),
        )
        .call()
        .await;

        assert_eq!(result, Err(TestError::Network));
        assert_eq!(
            *started.lock(),
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(3000),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        token.cancel();

        let result = builder(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TestError>(1) }
            },
            Arc::new(RecordingSleeper::default()),
        )
        .call_until_cancelled(&token)
        .await;

        assert!(matches!(result, Err(ResilienceError::Cancelled { attempts: 0 })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let counter = Arc::clone(&calls);
        let result = builder(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Network) }
            },
            Arc::new(TokioSleeper),
        )
        .call_until_cancelled(&token)
        .await;

        assert!(matches!(result, Err(ResilienceError::Cancelled { attempts: 1 })));

        // Nothing fires after the sequence was abandoned.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_attempt_in_flight() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let origin = Instant::now();
        let result = builder(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, TestError>(1)
                }
            },
            Arc::new(RecordingSleeper::default()),
        )
        .call_until_cancelled(&token)
        .await;

        assert!(matches!(result, Err(ResilienceError::Cancelled { attempts: 1 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(origin.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_cancellable_call_passes_failures_through() {
        let token = CancellationToken::new();

        let result = builder(
            || async { Err::<(), _>(TestError::Fatal) },
            Arc::new(RecordingSleeper::default()),
        )
        .call_until_cancelled(&token)
        .await;

        assert!(matches!(
            result,
            Err(ResilienceError::Operation(TestError::Fatal))
        ));
    }
}
