//! Bounded retry with backoff for upstream gateway calls
//!
//! Row-store and telephony calls are never retried by the callers
//! themselves; they go through this helper once and observe a single
//! success or failure.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy for a gateway call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled after every failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Run an async operation under the given retry policy.
///
/// The operation is re-invoked until it succeeds or the attempt budget
/// is spent; the last error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = policy.base_delay;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    op_name, attempt, policy.max_attempts, err
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
