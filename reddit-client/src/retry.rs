use selfpromo_core::{CoreError, RedditApiError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl RetryConfig {
    /// Retry config for Reddit reads. Kept short: a read that keeps failing is
    /// picked up again on the next poll anyway.
    pub fn reddit() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 20000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after the delay the server asked for
    RetryWithDelay(Duration),
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::RedditApi(reddit_error) => match reddit_error {
            RedditApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            RedditApiError::ServerError { .. } => RetryStrategy::Retry,
            RedditApiError::RequestTimeout => RetryStrategy::Retry,
            // The token is dropped before the error surfaces, the next attempt re-authenticates
            RedditApiError::InvalidToken => RetryStrategy::Retry,
            RedditApiError::AuthenticationFailed { .. }
            | RedditApiError::Forbidden { .. }
            | RedditApiError::SubredditNotFound { .. }
            | RedditApiError::PostNotFound { .. }
            | RedditApiError::UserNotFound { .. }
            | RedditApiError::InvalidResponse { .. }
            | RedditApiError::ActionRejected { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms);

    let jitter_range = (delay_ms as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    Duration::from_millis((delay_ms + jitter).min(config.max_delay_ms))
}

#[derive(Debug, Default)]
pub struct RetryMetrics {
    pub total_retries: AtomicU64,
    pub successful_retries: AtomicU64,
    pub failed_operations: AtomicU64,
}

/// Runs idempotent operations with retry logic. Writes never go through here.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: RetryMetrics,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: RetryMetrics::default(),
        }
    }

    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        self.metrics.successful_retries.fetch_add(1, Ordering::Relaxed);
                        info!("Operation {} succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    let has_attempts_left = attempt + 1 < self.config.max_attempts;
                    let delay = match get_retry_strategy(&error) {
                        RetryStrategy::Retry if has_attempts_left => {
                            calculate_delay(attempt, &self.config)
                        }
                        RetryStrategy::RetryWithDelay(delay) if has_attempts_left => delay,
                        strategy => {
                            if strategy != RetryStrategy::NoRetry {
                                warn!(
                                    "Operation {} failed after {} attempts: {}",
                                    operation_name,
                                    attempt + 1,
                                    error
                                );
                            } else {
                                debug!("Not retrying {} due to error type: {}", operation_name, error);
                            }
                            self.metrics.failed_operations.fetch_add(1, Ordering::Relaxed);
                            return Err(error);
                        }
                    };

                    info!("Retrying {} in {:?} due to: {}", operation_name, delay, error);
                    self.metrics.total_retries.fetch_add(1, Ordering::Relaxed);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub fn metrics(&self) -> &RetryMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_retry_strategies() {
        assert_eq!(
            get_retry_strategy(&CoreError::RedditApi(RedditApiError::RateLimitExceeded {
                retry_after: 7
            })),
            RetryStrategy::RetryWithDelay(Duration::from_secs(7))
        );
        assert_eq!(
            get_retry_strategy(&CoreError::RedditApi(RedditApiError::ServerError {
                status_code: 502
            })),
            RetryStrategy::Retry
        );
        assert_eq!(
            get_retry_strategy(&CoreError::RedditApi(RedditApiError::Forbidden {
                resource: "/r/anime/new".to_string()
            })),
            RetryStrategy::NoRetry
        );
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::reddit()
        };
        assert_eq!(calculate_delay(0, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(4000));
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(20000));
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        let config = RetryConfig::reddit();
        for attempt in 0..6 {
            assert!(calculate_delay(attempt, &config) <= Duration::from_millis(config.max_delay_ms));
        }
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let executor = RetryExecutor::new(fast_config());
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = executor
            .execute("flaky", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(executor.metrics().successful_retries.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let executor = RetryExecutor::new(fast_config());
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), CoreError> = executor
            .execute("forbidden", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::RedditApi(RedditApiError::Forbidden {
                    resource: "/api/remove".to_string(),
                }))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let executor = RetryExecutor::new(fast_config());
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), CoreError> = executor
            .execute("down", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 }))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(executor.metrics().failed_operations.load(Ordering::Relaxed), 1);
    }
}
