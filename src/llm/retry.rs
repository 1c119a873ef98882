//! Retry and concurrency control for LLM calls.
//!
//! The backoff shape is grounded on a benchmark retry helper found
//! elsewhere in the example pack: a fixed attempt budget, exponential
//! backoff with jitter, and a `tracing` span per attempt.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{Error, LlmError};

/// Whether an error is worth retrying, as opposed to a terminal failure
/// (schema mismatch, provider block, fatal config issue).
pub trait RetryableError {
    /// Returns true if the operation that produced this error may succeed
    /// on a subsequent attempt.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for Error {
    fn is_retryable(&self) -> bool {
        matches!(self, Error::Llm(LlmError::Transient(_)) | Error::ObjectStore(_))
    }
}

/// Fixed retry policy for LLM calls: 5 attempts, base delay 2s, exponential
/// backoff capped at 60s, with up to 20% jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on any single backoff delay.
    pub max_delay: Duration,
    /// Jitter fraction applied to each computed delay, in `[0.0, 1.0]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Computes the backoff delay before attempt number `attempt` (1-based),
    /// applying jitter and capping at `max_delay`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jitter_span = capped * self.jitter;
        let jittered = capped - jitter_span + fastrand::f64() * jitter_span * 2.0;
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Runs `op` under `policy`, retrying retryable errors with backoff until
/// the attempt budget is exhausted. `phase` names the call site for the
/// emitted `tracing` events (e.g. `"gs-check-extract:chunk-7"`).
pub async fn with_retry<F, Fut, T>(phase: &str, policy: &RetryPolicy, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && err.is_retryable() => {
                let delay = policy.backoff_delay(attempt);
                warn!(phase, attempt, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                debug!(phase, attempt, error = %err, "giving up");
                return Err(err);
            }
        }
    }
}

/// Bounds the number of concurrent LLM calls across the whole run.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing up to `max_concurrent` in-flight calls.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Acquires a permit, blocking until one is available. Fails only if
    /// the semaphore has been closed, which this limiter never does.
    pub async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, Error> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| LlmError::Fatal("concurrency limiter semaphore was closed".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert!(policy.backoff_delay(10) <= policy.max_delay);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryPolicy::default()
        };
        let result = with_retry("test", &policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Llm(LlmError::Transient("flaky".into())))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<(), Error> = with_retry("test", &policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Llm(LlmError::Schema("bad".into()))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn limiter_bounds_concurrency() {
        let limiter = ConcurrencyLimiter::new(1);
        let _permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.semaphore.available_permits(), 0);
    }
}
