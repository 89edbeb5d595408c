//! Bounded retry with a fixed inter-attempt delay
//!
//! Only errors that report themselves as retryable are retried; everything
//! else ends the sequence on the first failure.

use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Errors that know whether a fresh attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry budget for one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,

    /// Pause before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(750),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs out
    ///
    /// `op` receives the 1-based attempt number. Attempts never overlap.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    info!(
                        "Retrying after timeout (attempt {} of {})",
                        attempt, self.max_retries
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result: Result<u32, TestError> = policy
            .execute(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(attempt) }
            })
            .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let policy = RetryPolicy::new(2, Duration::from_millis(750));
        let start = Instant::now();

        let result = policy
            .execute(|attempt| async move {
                if attempt <= 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        // two fixed delays, nothing more
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(start.elapsed() < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(1, Duration::from_millis(750));

        let result: Result<(), TestError> = policy
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_attempts());
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let result: Result<(), TestError> = policy
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Permanent) }
            })
            .await;

        assert_eq!(result, Err(TestError::Permanent));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<(), TestError> = RetryPolicy::new(0, Duration::ZERO)
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.delay, Duration::from_millis(750));
    }
}
