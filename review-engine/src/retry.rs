//! Bounded exponential backoff for transient failures.
//!
//! Every outbound SCM and LLM call goes through [`with_backoff`]. Only
//! errors classified transient by [`Error::is_transient`] are retried;
//! authentication failures, malformed responses, and cancellation surface
//! immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RuntimeSection;
use crate::errors::ReviewResult;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total tries, first attempt included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_runtime(runtime: &RuntimeSection) -> Self {
        Self {
            max_attempts: runtime.retry_max_attempts,
            base_delay: Duration::from_millis(runtime.retry_base_delay_ms),
            max_delay: Duration::from_millis(runtime.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (0-based): base doubled per retry,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails non-transiently, or exhausts the
/// attempt budget. The last error is returned unwrapped so callers keep the
/// full error taxonomy.
pub async fn with_backoff<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> ReviewResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ReviewResult<T>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_transient() || attempt >= policy.max_attempts {
                    return Err(error);
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
