//! Retry with exponential backoff for storage writes.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{PublishError, PublishResult, StorageResult};
use crate::types::config::PublishConfig;

/// Backoff schedule for retryable storage errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PublishConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently or retries run out.
///
/// The outer error is reserved for cancellation; storage failures are
/// returned in the inner result.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> PublishResult<StorageResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            r = op() => r,
        };

        match result {
            Ok(value) => return Ok(Ok(value)),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                attempt += 1;
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying upload");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Ok(Err(e)),
        }
    }
}
