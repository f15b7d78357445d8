// src/store/retry.rs

use std::{future::Future, time::Duration};

use crate::{config::Config, error::TrackError};

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.store_max_retries,
            base_delay: config.store_retry_base,
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Runs `op`, retrying only errors that `TrackError::is_transient` accepts.
    /// A closed pool fails straight to `StoreUnavailable`. Domain errors are
    /// returned on the first occurrence.
    pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T, TrackError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TrackError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_unreachable() => {
                    tracing::error!("Store operation '{}' cannot reach the store: {}", name, err);
                    return Err(TrackError::StoreUnavailable {
                        attempts: retry + 1,
                    });
                }
                Err(err) if err.is_transient() => {
                    if retry >= self.max_retries {
                        tracing::error!(
                            "Store operation '{}' failed after {} attempts: {}",
                            name,
                            retry + 1,
                            err
                        );
                        return Err(TrackError::StoreUnavailable {
                            attempts: retry + 1,
                        });
                    }
                    let delay = self.delay_for(retry);
                    tracing::warn!(
                        "Store operation '{}' failed, retrying in {:?} (attempt {}): {}",
                        name,
                        delay,
                        retry + 1,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
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

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast()
            .run("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TrackError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_with_store_unavailable() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast()
            .run("down", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TrackError::Database(sqlx::Error::PoolTimedOut))
            })
            .await;
        assert!(matches!(
            result,
            Err(TrackError::StoreUnavailable { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast()
            .run("stale", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TrackError::StaleDay {
                    current: 2,
                    submitted: 1,
                })
            })
            .await;
        assert!(matches!(result, Err(TrackError::StaleDay { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast()
            .run("closed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TrackError::Database(sqlx::Error::PoolClosed))
            })
            .await;
        assert!(matches!(
            result,
            Err(TrackError::StoreUnavailable { attempts: 1 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(40));
    }
}
