//! Bounded retry with exponential backoff.
//!
//! One policy applied uniformly to every forecast task attempt. Only errors
//! whose [`Retryable::is_transient`] is true are retried; deterministic
//! errors fail on the first attempt. Cancellation is checked between
//! attempts, never inside one.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::admission::{CancelReason, CancellationToken};
use crate::error::Retryable;

/// Attempt bound and backoff schedule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Wait before the second attempt, in milliseconds
    pub initial_backoff_ms: u64,
    /// Growth factor between consecutive waits
    pub multiplier: f64,
    /// Upper bound on a single wait, in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            multiplier: 2.0,
            max_backoff_ms: 5_000,
        }
    }
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryFailure<E> {
    /// The last error, after `attempts` tries.
    Exhausted {
        /// Final error
        error: E,
        /// Attempts made
        attempts: u32,
    },
    /// Cancelled before attempt `attempts + 1`.
    Cancelled {
        /// Cancellation reason
        reason: CancelReason,
        /// Attempts completed before cancellation
        attempts: u32,
    },
}

impl RetryPolicy {
    /// A policy with no waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            multiplier: 1.0,
            max_backoff_ms: 0,
        }
    }

    /// Wait before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let ms = (self.initial_backoff_ms as f64 * exp).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms.max(0.0) as u64)
    }

    /// Returns a list of problems, empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_attempts == 0 {
            errors.push("retry.max_attempts must be >= 1".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            errors.push(format!("retry.multiplier must be >= 1, got {}", self.multiplier));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            errors.push(format!(
                "retry.max_backoff_ms ({}) is below initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            ));
        }
        errors
    }

    /// Runs `op` until it succeeds, fails deterministically, exhausts the
    /// attempt bound, or `token` is cancelled between attempts.
    ///
    /// `op` receives the 1-based attempt number. `label` tags the retry log.
    pub fn run<T, E, F>(&self, token: &CancellationToken, label: &str, mut op: F) -> Result<(T, u32), RetryFailure<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            if let Some(reason) = token.reason() {
                return Err(RetryFailure::Cancelled {
                    reason,
                    attempts: attempt,
                });
            }
            attempt += 1;
            match op(attempt) {
                Ok(value) => return Ok((value, attempt)),
                Err(error) if error.is_transient() && attempt < max => {
                    let wait = self.backoff(attempt);
                    warn!(
                        task = label,
                        attempt,
                        max_attempts = max,
                        backoff_ms = wait.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    if !wait.is_zero() {
                        thread::sleep(wait);
                    }
                }
                Err(error) => {
                    return Err(RetryFailure::Exhausted {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}
