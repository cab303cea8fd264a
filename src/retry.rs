//! Retry Mechanism
//!
//! Bounded retry with exponential backoff and jitter for the primary ask
//! path. Only retryable error classes (timeouts, connection failures, rate
//! limits, 5xx) are retried; auth and client errors fail fast. Best-effort
//! auxiliary calls are single-shot and never go through here.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::AuxKnowError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub use_jitter: bool,
    /// Maximum jitter fraction (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts.
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the initial delay.
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Calculate the delay for a given (zero-based) attempt.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(base as u64).min(self.max_delay);
        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = if range > 0.0 {
            rng.gen_range(-range..=range)
        } else {
            0.0
        };
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }
}

/// Drives an async operation under a [`RetryPolicy`].
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor for the given policy.
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Execute the operation, retrying retryable failures with backoff.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, AuxKnowError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AuxKnowError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !error.is_retryable() {
                        tracing::warn!(
                            category = ?error.category(),
                            error = %error,
                            "provider call failed, not retrying"
                        );
                        return Err(error);
                    }
                    last_error = Some(error);

                    if attempt == self.policy.max_attempts - 1 {
                        tracing::warn!(
                            attempts = self.policy.max_attempts,
                            "provider call still failing, giving up"
                        );
                        break;
                    }

                    let delay = self.policy.calculate_delay(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying provider call"
                    );
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AuxKnowError::Internal("retry executor finished without an error".to_string())
        }))
    }
}
