//! Bounded exponential backoff for remote calls

use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::warn;

use crate::error::TimerResult;

/// Retry delays follow `base * 2^(attempt - 1)`, capped at `max_delay`.
/// With the defaults: 2s, 4s, 8s, then give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt` (1-based), or `None` once the cap
    /// is reached.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }

    /// Run `op`, retrying transient failures. Non-transient errors such as
    /// authorization failures are returned immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> TimerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TimerResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    let Some(delay) = self.delay_for(attempt) else {
                        return Err(e);
                    };
                    warn!(
                        "{} failed: {}; retrying in {:?} ({}/{})",
                        what, e, delay, attempt, self.max_retries
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimerError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn delays_double_then_cap() {
        let policy = RetryPolicy::default().with_max_retries(6);
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(8)));
        assert_eq!(policy.delay_for(5), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay_for(7), None);
        assert_eq!(policy.delay_for(0), None);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast()
            .run("fetch", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TimerError::RemoteSync("flaky".into()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_cap() {
        let calls = AtomicU32::new(0);
        let result: TimerResult<()> = fast()
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TimerError::RemoteSync("down".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn authorization_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: TimerResult<()> = fast()
            .run("publish", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TimerError::Authorization("no token".into()))
            })
            .await;
        assert!(matches!(result, Err(TimerError::Authorization(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
