use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS};
use crate::error::Result;

/// Re-runs a failing operation a bounded number of times with a fixed delay
/// between attempts. Every error is retried the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, Duration::from_millis(DEFAULT_RETRY_DELAY_MS))
    }
}

impl RetryPolicy {
    /// `attempts` is the total number of tries, clamped to at least one.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.attempts => {
                    tracing::error!(
                        operation = operation_name,
                        attempts = self.attempts,
                        error = %err,
                        "giving up after final attempt"
                    );
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
