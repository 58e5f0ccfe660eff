//! Bounded retry with exponential backoff
//!
//! The policy is decoupled from its call site: callers supply a
//! fatal-vs-retryable classifier and the operation, the policy owns the
//! attempt loop and the backoff sleeps. Backoff doubles per attempt
//! (`base * 2^attempt`).

use std::time::Duration;

/// Failure classification decided by the caller's classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Do not retry; surface the error immediately
    Fatal,
    /// Transient; retry after backoff if attempts remain
    Retryable,
}

/// How a retried operation ultimately failed
#[derive(Debug)]
pub enum RetryError<E> {
    /// Classifier said fatal on some attempt
    Fatal(E),
    /// All attempts consumed by retryable failures
    Exhausted { attempts: u32, last: E },
}

/// Retry policy: bounded attempts, exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        debug_assert!(max_attempts >= 1);
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the retry following attempt `attempt` (0-based).
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `operation` up to `max_attempts` times.
    ///
    /// After each retryable failure (per `classify`) the policy sleeps
    /// `base * 2^attempt` before the next attempt. A fatal classification
    /// returns immediately without further attempts.
    pub async fn run<F, Fut, T, E, C>(
        &self,
        operation_name: &str,
        classify: C,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        C: Fn(&E) -> RetryClass,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if classify(&err) == RetryClass::Fatal {
                        tracing::error!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            error = %err,
                            "Fatal error, not retrying"
                        );
                        return Err(RetryError::Fatal(err));
                    }

                    attempt += 1;
                    if attempt >= self.max_attempts {
                        tracing::error!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %err,
                            "Retries exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }

                    let backoff = self.backoff_for(attempt - 1);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retryable error, will retry after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
