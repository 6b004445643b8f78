//! Fixed-backoff retry for completion calls.

use std::future::Future;
use std::time::Duration;

use simarena_core::completion::CompletionError;
use tracing::warn;

/// Total attempts per call: the first try plus one retry.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Pause between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// How many times to try a call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; values below 1 count as 1.
    pub max_attempts: u32,
    /// Fixed wait before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Default attempt count with a custom backoff.
    pub const fn with_backoff(backoff: Duration) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff,
        }
    }

    /// Run `call` until it succeeds or attempts run out.
    ///
    /// `call` receives the 1-based attempt number. Every error is retried;
    /// the final one is wrapped in [`CompletionError::Exhausted`].
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, CompletionError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CompletionError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 1;
        loop {
            match call(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    warn!(operation, attempt, error = %err, "completion attempt failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => {
                    return Err(CompletionError::Exhausted {
                        operation,
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
            }
        }
    }
}
