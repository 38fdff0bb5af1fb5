use std::{future::Future, time::Duration};

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::{config::RetryConfig, error::ServiceError};

/// Bounded exponential backoff for operations that lose optimistic version checks.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: u32,
    max_backoff: Duration,
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.multiplier.max(1),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl RetryPolicy {
    /// Run `attempt` until it succeeds, fails with something other than a
    /// concurrency conflict, or the attempt budget is spent.
    ///
    /// The closure receives the zero-based attempt number.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, ServiceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut current = 0;
        loop {
            match attempt(current).await {
                Err(err) if err.is_conflict() => {
                    current += 1;
                    if current >= self.max_attempts {
                        error!(operation, attempts = current, error = %err, "retries exhausted");
                        return Err(err);
                    }
                    let delay = jittered(backoff);
                    debug!(operation, attempt = current, delay_ms = delay.as_millis() as u64, "version conflict; retrying");
                    sleep(delay).await;
                    backoff = (backoff * self.multiplier).min(self.max_backoff);
                }
                outcome => return outcome,
            }
        }
    }
}

/// Spread retries of contending callers over `[backoff / 2, backoff]`.
fn jittered(backoff: Duration) -> Duration {
    let max = backoff.as_millis() as u64;
    if max < 2 {
        return backoff;
    }
    Duration::from_millis(rand::rng().random_range(max / 2..=max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::storage::StorageError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn conflict() -> ServiceError {
        ServiceError::ConcurrencyConflict(StorageError::Conflict {
            resource: "song",
            id: Uuid::nil(),
            expected: 1,
            actual: 2,
        })
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            multiplier: 2,
            max_backoff_ms: 4,
        }
        .into()
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast(5)
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 { Err(conflict()) } else { Ok(attempt) }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast(3)
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(conflict()) }
            })
            .await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast(5)
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::AlreadyVoted) }
            })
            .await;
        assert!(matches!(result, Err(ServiceError::AlreadyVoted)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
