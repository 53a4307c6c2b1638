//! Retry utilities with fixed or linear backoff.
//!
//! Delays are scheduled with `tokio::time::sleep`, so a retry never blocks the
//! thread that issued the request, and the cancel flag is checked before every
//! attempt.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::cancel::CancelFlag;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay multiplied by the number of failed attempts so far
    Linear,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between attempts
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Linear,
        }
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay to wait after `failed` attempts have failed
    pub fn delay_after(&self, failed: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(failed.max(1)),
        }
    }
}

/// Errors that know whether another attempt could help
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// The cancel flag was set before an attempt
    Cancelled,
    /// The last error, after `attempts` attempts
    Failed { error: E, attempts: u32 },
}

/// Execute an async operation, retrying transient failures.
///
/// Permanent errors return immediately. The cancel flag is checked before each
/// attempt, including the first.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancelFlag,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!("Operation succeeded on attempt {}", attempts);
                }
                return Ok(value);
            }
            Err(error) if error.is_transient() && attempts < policy.max_attempts => {
                let delay = policy.delay_after(attempts);
                tracing::debug!(
                    "Transient error on attempt {}/{}: {}, retrying in {:?}",
                    attempts,
                    policy.max_attempts,
                    error,
                    delay
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
            Err(error) => {
                if error.is_transient() {
                    tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
                }
                return Err(RetryError::Failed { error, attempts });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(bool);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient: {})", self.0)
        }
    }

    impl Retryable for TestError {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_backoff_delays() {
        let fixed = RetryPolicy::fixed(3, Duration::from_millis(100));
        assert_eq!(fixed.delay_after(1), Duration::from_millis(100));
        assert_eq!(fixed.delay_after(2), Duration::from_millis(100));

        let linear = RetryPolicy::linear(3, Duration::from_millis(100));
        assert_eq!(linear.delay_after(1), Duration::from_millis(100));
        assert_eq!(linear.delay_after(2), Duration::from_millis(200));

        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<TestError>> = with_retry(
            RetryPolicy::fixed(3, Duration::ZERO),
            &CancelFlag::new(),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(TestError(true))
                } else {
                    Ok(n)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<TestError>> = with_retry(
            RetryPolicy::fixed(3, Duration::ZERO),
            &CancelFlag::new(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError(false))
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Failed { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let result: Result<(), RetryError<TestError>> = with_retry(
            RetryPolicy::fixed(2, Duration::ZERO),
            &CancelFlag::new(),
            || async { Err(TestError(true)) },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Failed { attempts: 2, .. })));
    }

    #[tokio::test]
    async fn test_cancel_observed_between_attempts() {
        let cancel = CancelFlag::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<TestError>> =
            with_retry(RetryPolicy::fixed(3, Duration::ZERO), &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                async { Err(TestError(true)) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
