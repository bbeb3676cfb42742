//! Retry back-off strategy
//!
//! A retryable result is resubmitted after a delay that grows with the
//! number of retries already attempted:
//!
//! - **Exponential**: `delay * 2^retry_count`
//! - **Linear**: `delay * retry_count`
//!
//! Both are capped at `max_delay`. Optional jitter adds a random fraction of
//! the delay so that many throttled callers do not retry in lockstep.
//!
//! # Example
//!
//! ```
//! use cpio_core_resilience::retry::{BackoffKind, RetryStrategy};
//! use std::time::Duration;
//!
//! let strategy = RetryStrategy::new(BackoffKind::Exponential, Duration::from_millis(100), 5)
//!     .with_max_delay(Duration::from_secs(1));
//!
//! assert_eq!(strategy.back_off_duration(0), Duration::from_millis(100));
//! assert_eq!(strategy.back_off_duration(3), Duration::from_millis(800));
//! assert_eq!(strategy.back_off_duration(4), Duration::from_secs(1)); // capped
//! assert!(strategy.exhausted(5));
//! ```

use crate::error::ResilienceError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Doubling delay (2^n)
    #[default]
    Exponential,

    /// Delay proportional to the retry count
    Linear,
}

/// Back-off schedule and retry budget
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStrategy {
    pub kind: BackoffKind,

    /// Base delay
    pub delay: Duration,

    /// Maximum delay (caps the back-off)
    pub max_delay: Duration,

    /// Retries allowed after the first attempt
    pub max_retries: usize,

    /// Upper bound of the random fraction added to each delay (0.0 disables)
    pub jitter_factor: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential,
            delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            max_retries: 5,
            jitter_factor: 0.0,
        }
    }
}

impl RetryStrategy {
    pub fn new(kind: BackoffKind, delay: Duration, max_retries: usize) -> Self {
        Self {
            kind,
            delay,
            max_retries,
            ..Default::default()
        }
    }

    /// Never retry
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    pub fn validate(&self) -> Result<(), ResilienceError> {
        if self.max_delay < self.delay {
            return Err(ResilienceError::InvalidConfig(format!(
                "max_delay ({:?}) is shorter than delay ({:?})",
                self.max_delay, self.delay
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ResilienceError::InvalidConfig(format!(
                "jitter_factor must be within [0, 1], got {}",
                self.jitter_factor
            )));
        }
        Ok(())
    }

    /// True once `retry_count` retries have used up the budget
    pub fn exhausted(&self, retry_count: usize) -> bool {
        retry_count >= self.max_retries
    }

    /// Delay before the retry that follows `retry_count` earlier retries
    pub fn back_off_duration(&self, retry_count: usize) -> Duration {
        let base = match self.kind {
            BackoffKind::Exponential => u32::try_from(retry_count)
                .ok()
                .and_then(|n| 2_u32.checked_pow(n))
                .and_then(|factor| self.delay.checked_mul(factor)),
            BackoffKind::Linear => u32::try_from(retry_count)
                .ok()
                .and_then(|n| self.delay.checked_mul(n)),
        };

        // overflow means far past the cap
        base.unwrap_or(self.max_delay).min(self.max_delay)
    }

    /// [`back_off_duration`](Self::back_off_duration) plus random jitter
    pub fn back_off_duration_with_jitter(&self, retry_count: usize) -> Duration {
        let delay = self.back_off_duration(retry_count);
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let jitter = rand::rng().random_range(0.0..self.jitter_factor);
        delay + Duration::from_secs_f64(delay.as_secs_f64() * jitter)
    }
}
