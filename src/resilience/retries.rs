//! Retry logic for provider adapters.
//!
//! # Responsibilities
//! - Re-run a failed upstream request when the error is transient
//! - Space attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - Used inside provider adapters only; the orchestrator never retries, a
//!   failed exchange is retried by the next incoming request
//! - The caller classifies errors; non-retryable errors return immediately

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::Backoff;

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::new(Duration::ZERO, Duration::ZERO),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::new(
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_delay_ms),
            ),
        }
    }
}

/// Run `op` until it succeeds, returns a non-retryable error, or the attempt
/// budget is spent. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    mut op: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.backoff.delay(attempt);
                tracing::info!(attempt, delay = ?delay, error = %e, "Retrying provider request");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
