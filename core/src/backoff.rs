//! Exponential backoff used between retry attempts
//!
//! The default configuration is pure exponential backoff: the delay after
//! attempt `n` is `base_delay_ms * 2^(n-1)`, with no jitter and no cap.
//! Jitter and a cap are available as opt-in knobs.

use rand::Rng;

/// Exponential backoff calculator
///
/// Delays grow exponentially: base_delay * multiplier^(attempt-1)
///
/// # Example
///
/// ```rust
/// use net_resilience::ExponentialBackoff;
///
/// let backoff = ExponentialBackoff::new()
///     .base_delay_ms(1000)
///     .max_attempts(3);
///
/// assert_eq!(backoff.delay_ms(1), Some(1000));
/// assert_eq!(backoff.delay_ms(2), Some(2000));
/// assert_eq!(backoff.delay_ms(3), None); // last attempt, nothing left to wait for
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay in milliseconds
    pub base_delay_ms: u64,
    /// Exponential backoff multiplier
    pub multiplier: f64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base delay in milliseconds
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Set the exponential multiplier
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the maximum delay cap in milliseconds
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Set the maximum number of attempts (values below 1 become 1)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = if factor.is_nan() {
            0.0
        } else {
            factor.clamp(0.0, 1.0)
        };
        self
    }

    /// Check if another attempt may follow `attempt` (1-indexed)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`, ignoring jitter
    ///
    /// Returns `None` once `attempt` reaches `max_attempts`.
    pub fn delay_ms(&self, attempt: u32) -> Option<u64> {
        if !self.should_retry(attempt) {
            return None;
        }
        Some(self.capped(attempt) as u64)
    }

    /// Delay before the attempt following `attempt`, with jitter applied
    ///
    /// With `jitter_factor == 0.0` this is identical to [`delay_ms`](Self::delay_ms).
    pub fn delay<R: Rng>(&self, attempt: u32, rng: &mut R) -> Option<u64> {
        if !self.should_retry(attempt) {
            return None;
        }

        let capped = self.capped(attempt);
        let jitter_factor = self.jitter_factor.clamp(0.0, 1.0);
        if jitter_factor == 0.0 {
            return Some(capped as u64);
        }

        // base * (1 - jitter + rand * jitter)
        let random_scalar: f64 = rng.random_range(0.0..=1.0);
        let jitter_blend = 1.0 - jitter_factor + random_scalar * jitter_factor;

        Some((capped * jitter_blend) as u64)
    }

    fn capped(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_exponential = (self.base_delay_ms as f64) * self.multiplier.powi(exponent);
        base_exponential.min(self.max_delay_ms as f64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: u64::MAX,
            jitter_factor: 0.0,
        }
    }
}
