//! Bounded retry with backoff
//!
//! Every wait for external state (stack completion, result availability,
//! deletions) goes through [`RetryPolicy::execute`] with its own
//! [`RetryConfig`]; no component runs a polling loop of its own.

use crate::error::{CloudError, Result};
use crate::provider::Sleeper;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Ceiling on the number of attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLimit {
    /// At most this many invocations (at least one)
    Bounded(u32),
    /// No counted ceiling; only use under an outer timeout
    Unbounded,
}

impl AttemptLimit {
    fn allows(&self, attempts: u32) -> bool {
        match self {
            AttemptLimit::Bounded(max) => attempts < *max,
            AttemptLimit::Unbounded => true,
        }
    }
}

/// Retry configuration for one call site
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Wait after the first failed attempt
    pub interval: Duration,

    /// Maximum number of attempts
    pub max_attempts: AttemptLimit,

    /// Label carried by [`CloudError::RetryExhausted`]
    pub failure_label: String,

    /// Growth factor applied to the wait after each failure (1.0 keeps it fixed)
    pub backoff_multiplier: f64,

    /// Upper bound on a single wait
    pub max_interval: Duration,
}

impl RetryConfig {
    /// Fixed-interval retry with a counted ceiling
    pub fn bounded(failure_label: impl Into<String>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: AttemptLimit::Bounded(max_attempts.max(1)),
            failure_label: failure_label.into(),
            backoff_multiplier: 1.0,
            max_interval: interval,
        }
    }

    /// Fixed-interval retry without a counted ceiling
    pub fn unbounded(failure_label: impl Into<String>, interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: AttemptLimit::Unbounded,
            failure_label: failure_label.into(),
            backoff_multiplier: 1.0,
            max_interval: interval,
        }
    }

    /// Grow the wait by `multiplier` after every failure, capped at `max_interval`
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    /// Same timing, label narrowed to one subject (`"<label>: <subject>"`)
    pub fn for_subject(&self, subject: impl fmt::Display) -> Self {
        Self {
            failure_label: format!("{}: {}", self.failure_label, subject),
            ..self.clone()
        }
    }

    /// Wait following the failure of attempt `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = (self.interval.as_millis() as f64 * factor)
            .min(self.max_interval.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Executes fallible operations under a [`RetryConfig`]
#[derive(Clone)]
pub struct RetryPolicy {
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicy {
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Run `op` until it succeeds or the attempt ceiling is reached
    ///
    /// A success returns immediately. After each failure the policy waits
    /// [`RetryConfig::delay_for_attempt`] and invokes `op` again; there is no
    /// wait after the final attempt. `op` must be safe to re-invoke.
    pub async fn execute<T, F, Fut>(&self, config: &RetryConfig, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts: u32 = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempts = attempts.saturating_add(1);

            if !config.max_attempts.allows(attempts) {
                tracing::warn!(
                    label = %config.failure_label,
                    attempts,
                    "Retries exhausted: {}",
                    err
                );
                return Err(CloudError::RetryExhausted {
                    label: config.failure_label.clone(),
                    attempts,
                    last_error: err.to_string(),
                });
            }

            let delay = config.delay_for_attempt(attempts - 1);
            tracing::debug!(
                label = %config.failure_label,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, retrying: {}",
                err
            );
            self.sleeper.sleep(delay).await;
        }
    }
}
