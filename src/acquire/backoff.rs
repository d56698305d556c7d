//! Retry/backoff schedule for file-transfer fetches:
//! `min(6000ms, attempts * 2000ms)`.

use std::time::Duration;

use crate::config::{MAX_RETRY_INTERVAL_MS, RETRY_BACKOFF_MS};

/// A bounded retry policy: try up to `limit` times, waiting an increasing,
/// capped interval between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub limit: u8,
}

impl RetryPolicy {
    pub fn new(limit: u8) -> Self {
        Self { limit }
    }

    /// The backoff delay before retry attempt number `attempt` (1-indexed):
    /// `min(MAX_RETRY_INTERVAL_MS, attempt * RETRY_BACKOFF_MS)`.
    pub fn delay_for_attempt(attempt: u8) -> Duration {
        let ms = (attempt as u64).saturating_mul(RETRY_BACKOFF_MS);
        Duration::from_millis(ms.min(MAX_RETRY_INTERVAL_MS))
    }

    /// Run `op` up to `self.limit` times, sleeping the backoff schedule
    /// between failed attempts, returning the last error if every attempt
    /// fails.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u8) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u8;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.limit {
                        return Err(err);
                    }
                    tracing::warn!(
                        target: "acquire::backoff",
                        attempt,
                        limit = self.limit,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(Self::delay_for_attempt(attempt)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_caps_at_max_interval() {
        assert_eq!(RetryPolicy::delay_for_attempt(1).as_millis(), 2000);
        assert_eq!(RetryPolicy::delay_for_attempt(2).as_millis(), 4000);
        assert_eq!(RetryPolicy::delay_for_attempt(3).as_millis(), 6000);
        assert_eq!(RetryPolicy::delay_for_attempt(10).as_millis(), 6000);
    }

    #[tokio::test]
    async fn run_returns_ok_on_eventual_success() {
        let policy = RetryPolicy::new(3);
        let result = policy
            .run(|attempt| async move {
                if attempt < 2 {
                    Err("not yet")
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn run_gives_up_after_limit_attempts() {
        let policy = RetryPolicy::new(2);
        let mut calls = 0;
        let result = policy
            .run(|_attempt| {
                calls += 1;
                async move { Err::<(), _>("always fails") }
            })
            .await;
        assert_eq!(result, Err("always fails"));
        assert_eq!(calls, 2);
    }
}
