use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::errors::SyncError;

/// リトライ戦略（線形バックオフ）
///
/// `attempt` 回目の失敗後は `base_delay * attempt` 待つ（`max_delay` で頭打ち）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    /// 最大試行回数（初回を含む）
    pub max_attempts: u32,
    /// 基準遅延時間
    pub base_delay: Duration,
    /// 最大遅延時間
    pub max_delay: Duration,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(1000))
    }
}

impl RetryStrategy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// `attempt` 回目の失敗後の待機時間
    pub fn delay_after(&self, attempt: u32) -> Duration {
        std::cmp::min(self.base_delay.saturating_mul(attempt), self.max_delay)
    }
}

/// リトライ実行結果
#[derive(Debug)]
pub enum RetryResult<T> {
    /// 成功
    Success { value: T, attempts: u32 },
    /// 最大試行回数に達して失敗
    MaxAttemptsReached { error: SyncError, attempts: u32 },
    /// リトライ不可能なエラーで失敗
    NonRetryable { error: SyncError, attempts: u32 },
}

impl<T> RetryResult<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. }
            | RetryResult::MaxAttemptsReached { attempts, .. }
            | RetryResult::NonRetryable { attempts, .. } => *attempts,
        }
    }
}

/// リトライ実行器
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    strategy: RetryStrategy,
}

impl RetryExecutor {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    /// 操作をリトライ付きで実行
    ///
    /// `operation` には 1 始まりの試行回数が渡される。
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> RetryResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut attempt = 1;

        loop {
            debug!(
                "Executing operation, attempt {}/{}",
                attempt, self.strategy.max_attempts
            );

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Operation succeeded after {} attempts", attempt);
                    }
                    return RetryResult::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    if !error.metadata().retryable {
                        warn!("Non-retryable error encountered: {}", error);
                        return RetryResult::NonRetryable {
                            error,
                            attempts: attempt,
                        };
                    }

                    if attempt >= self.strategy.max_attempts {
                        error!(
                            "Max attempts ({}) reached, giving up: {}",
                            self.strategy.max_attempts, error
                        );
                        return RetryResult::MaxAttemptsReached {
                            error,
                            attempts: attempt,
                        };
                    }

                    let delay = self.strategy.delay_after(attempt);
                    warn!(
                        "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt, self.strategy.max_attempts, delay, error
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(RetryStrategy::linear(max_attempts, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let result = fast(3)
            .execute(|_| async { Ok::<i32, SyncError>(42) })
            .await;

        match result {
            RetryResult::Success { value, attempts } => {
                assert_eq!(value, 42);
                assert_eq!(attempts, 1);
            }
            _ => panic!("Expected success"),
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let result = fast(3)
            .execute(|attempt| async move {
                if attempt < 3 {
                    Err(SyncError::TransientDelivery("503".to_string()))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        match result {
            RetryResult::Success { value, attempts } => {
                assert_eq!(value, 3);
                assert_eq!(attempts, 3);
            }
            _ => panic!("Expected success after retries"),
        }
    }

    #[tokio::test]
    async fn test_sustained_transient_failure_makes_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast(3)
            .execute(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), SyncError>(SyncError::TransientDelivery("timeout".to_string()))
                }
            })
            .await;

        assert!(matches!(
            result,
            RetryResult::MaxAttemptsReached { attempts: 3, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast(3)
            .execute(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), SyncError>(SyncError::ValidationDelivery {
                        status: 422,
                        body: "invalid".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, RetryResult::NonRetryable { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_linear_delay_calculation() {
        let strategy = RetryStrategy::linear(5, Duration::from_millis(1000));

        assert_eq!(strategy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(strategy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(strategy.delay_after(3), Duration::from_millis(3000));
        assert_eq!(strategy.delay_after(100), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryStrategy::linear(0, Duration::ZERO).max_attempts, 1);
    }
}
