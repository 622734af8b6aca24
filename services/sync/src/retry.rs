use std::future::Future;
use std::time::Duration;

use crate::source::SourceError;

/// Bounded exponential backoff for calls to the content source.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Ceiling applied to a server-provided `Retry-After`.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// A `Retry-After` hint wins over the computed backoff.
    pub fn delay_for(&self, attempt: u32, err: &SourceError) -> Duration {
        match err.retry_after() {
            Some(hint) => hint.min(self.max_retry_after),
            None => self.backoff(attempt),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the retry
/// budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut last_error = String::new();
    let mut delay = Duration::ZERO;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tracing::warn!(
                attempt,
                backoff_ms = delay.as_millis() as u64,
                error = %last_error,
                "retrying content source after backoff"
            );
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                delay = policy.delay_for(attempt + 1, &err);
                last_error = err.to_string();
            }
            Err(err) => return Err(err),
        }
    }

    Err(SourceError::MaxRetriesExceeded {
        attempts: policy.max_retries + 1,
        last_error,
    })
}
