//! Retry logic for data-access calls.
//!
//! # Responsibilities
//! - Run one operation up to `max_retries + 1` times
//! - Sleep `initial × multiplier^(attempt-1)` between attempts
//! - Surface the last attempt's error unchanged
//!
//! # Design Decisions
//! - The policy comes from the caller's pinned snapshot; nothing is cached here
//! - Every error is retried; there is no transient/permanent classification
//! - Writes retry only when the caller supplied an idempotency key
//! - No cancellation token: dropping the future stops the loop at its next
//!   suspension point

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub const fn once() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Run `op` until it succeeds or the attempts are spent.
    pub async fn retry<T, E, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt <= self.max_retries => {
                    let delay =
                        calculate_backoff(attempt, self.initial_delay, self.backoff_multiplier);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    metrics::record_retry_attempt(operation);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(operation, attempts = attempt, error = %e, "Operation failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    /// Like [`RetryPolicy::retry`], but a write without an idempotency key
    /// gets exactly one attempt.
    pub async fn retry_write<T, E, F, Fut>(
        &self,
        operation: &'static str,
        idempotency_key: Option<&str>,
        op: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match idempotency_key {
            Some(key) => {
                tracing::debug!(operation, idempotency_key = key, "Retrying write with key");
                self.retry(operation, op).await
            }
            None => RetryPolicy::once().retry(operation, op).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn policy(max_retries: u32, initial_ms: u64, multiplier: f64) -> RetryPolicy {
        RetryPolicy::from(&RetryConfig {
            max_retries,
            initial_delay_ms: initial_ms,
            backoff_multiplier: multiplier,
        })
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<&str, String> = policy(3, 20, 2.0)
            .retry("get_user", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(20 + 40));
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy(3, 1, 2.0)
            .retry("list_tasks", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {} failed", n))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.unwrap_err(), "attempt 4 failed");
    }

    #[tokio::test]
    async fn test_write_without_key_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy(3, 1, 2.0)
            .retry_write("create_task", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("conflict".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_with_key_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy(2, 1, 1.0)
            .retry_write("create_task", Some("req-7"), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 1 {
                    Err("timeout".to_string())
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = policy(0, 1000, 2.0)
            .retry("delete_user", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
