use std::future::Future;
use std::time::Duration;

use crate::errors::AppError;

/// Retry settings shared by every mutation path that retries.
///
/// The delay before retry `n` (0-based) is `base_delay * (n + 1)`.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub retryable: fn(&AppError) -> bool,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            retryable: AppError::is_retryable,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Single attempt, for swap and delete.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn with_predicate(mut self, retryable: fn(&AppError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.base_delay.saturating_mul(attempt as u32 + 1)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_retries && (policy.retryable)(&e) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_grows_with_attempt() {
        let policy = RetryPolicy::new(2, Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = &AtomicUsize::new(0);
        let result = retry_with_backoff(&fast(), "update", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::Backend { status: 503, message: "busy".into() })
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = &AtomicUsize::new(0);
        let op = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::RateLimited("slow down".into()))
        };
        let result: Result<(), AppError> = retry_with_backoff(&fast(), "update", op).await;
        assert!(matches!(result, Err(AppError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = &AtomicUsize::new(0);
        let op = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Backend { status: 422, message: "bad".into() })
        };
        let result: Result<(), AppError> = retry_with_backoff(&fast(), "update", op).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let calls = &AtomicUsize::new(0);
        let policy = fast().with_predicate(|e| matches!(e, AppError::NotFound(_)));
        let op = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::NotFound("b1".into()))
        };
        let result: Result<(), AppError> = retry_with_backoff(&policy, "lookup", op).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
