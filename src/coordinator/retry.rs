//! Retry Module
//!
//! Bounded exponential backoff around store calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Result;

/// Retry policy with exponential backoff for transient store errors.
///
/// Backoff doubles with each retry up to `max_backoff`. Only errors for
/// which [`GridError::is_retryable`](crate::error::GridError::is_retryable) holds are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(50), Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Same policy limited to one attempt.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..self.clone()
        }
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts
    /// run out. Returns the last error in the latter two cases.
    pub async fn execute<F, Fut, T>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempts", what, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.backoff(attempt - 1);
                    warn!(
                        "{} attempt {}/{} failed: {}. Retrying in {:?}",
                        what, attempt, self.max_attempts, err, backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!("{} gave up after {} attempts: {}", what, attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }
}
