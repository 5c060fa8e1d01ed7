//! Bounded exponential backoff for store writes

use std::fmt::Display;
use std::time::Duration;

/// Retry budget of a store write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after the first failed attempt
    pub base: Duration,
    /// Attempts in total, the first included
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Wait after failed attempt number `attempt` (1-based): `base * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor)
    }
}

/// Outcome of a retried operation with the waits it took
#[derive(Debug)]
pub struct RetryReport<T, E> {
    pub result: Result<T, E>,
    /// Attempts made
    pub attempts: u32,
    /// Backoff waits slept between attempts, in order
    pub waits: Vec<Duration>,
}

/// Runs `operation` until it succeeds or the policy's attempts are spent
///
/// The closure receives the 1-based attempt number. Between attempts the
/// task sleeps `policy.delay_for(attempt)`.
pub async fn retry_with_backoff<T, E, F>(policy: RetryPolicy, mut operation: F) -> RetryReport<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    E: Display,
{
    let mut waits = Vec::new();
    let mut attempt = 1;

    loop {
        match operation(attempt) {
            Ok(value) => {
                return RetryReport {
                    result: Ok(value),
                    attempts: attempt,
                    waits,
                }
            }
            Err(e) if attempt >= policy.max_attempts => {
                return RetryReport {
                    result: Err(e),
                    attempts: attempt,
                    waits,
                }
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                waits.push(delay);
                attempt += 1;
            }
        }
    }
}
