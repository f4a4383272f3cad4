//! Bounded retry with exponential backoff and jitter.
//!
//! The original tool never retried; retries stay off by default
//! (`max_retries = 0`) and only apply when the user opts in via
//! `--max-retries`.

use std::future::Future;

use rand::Rng as _;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Exponential backoff configuration with jitter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_secs: 5,
            max_delay_secs: 60,
        }
    }
}

impl RetryConfig {
    /// Compute the delay for a given retry attempt (0-indexed):
    /// `min(base_delay * 2^retry, max_delay) + random_jitter(0..base_delay)`.
    pub fn delay_for_retry(&self, retry: u32) -> std::time::Duration {
        let exp_delay = self
            .base_delay_secs
            .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX));
        let capped = exp_delay.min(self.max_delay_secs);
        let jitter = if self.base_delay_secs > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_secs)
        } else {
            0
        };
        std::time::Duration::from_secs(capped + jitter)
    }
}

/// Retry an async operation with exponential backoff.
///
/// `classifier` inspects each error and returns `Retry` or `Abort`.
/// Returns the first `Ok`, or the last error once retries are exhausted or
/// the classifier aborts. With the default config this runs the operation
/// exactly once.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classifier: C,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = config.max_retries + 1;
    let mut last_err: Option<E> = None;

    for attempt in 0..total_attempts {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if classifier(&e) == RetryAction::Abort {
                    return Err(e);
                }
                let is_last = attempt + 1 >= total_attempts;
                if is_last {
                    last_err = Some(e);
                    break;
                }
                let delay = config.delay_for_retry(attempt);
                tracing::warn!(
                    "Transfer error (attempt {}/{}), retrying in {}s: {}",
                    attempt + 1,
                    total_attempts,
                    delay.as_secs(),
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_err.expect("loop must have run at least once"))
}
