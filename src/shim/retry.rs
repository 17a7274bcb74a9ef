//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::{DEFAULT_SHIM_LOAD_MAX_RETRIES, DEFAULT_SHIM_LOAD_RETRY_DELAY_MS};

/// Retry limits for shim loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first failure
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before the retry following failed `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_SHIM_LOAD_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_SHIM_LOAD_RETRY_DELAY_MS),
        }
    }
}

/// Result of [`retry_load`]: the value if any attempt succeeded, otherwise
/// the last error.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Option<T>,
    pub attempts: u32,
    pub last_error: Option<anyhow::Error>,
}

impl<T> RetryOutcome<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}

/// Runs `loader` up to `max_retries + 1` times, sleeping
/// `base_delay * 2^attempt` between failures.
pub async fn retry_load<T, F, Fut>(name: &str, policy: &RetryPolicy, mut loader: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let total = policy.max_retries.saturating_add(1);
    let mut last_error = None;

    for attempt in 0..total {
        match loader().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(name, attempt = attempt + 1, "succeeded after retry");
                }
                return RetryOutcome {
                    result: Some(value),
                    attempts: attempt + 1,
                    last_error: None,
                };
            }
            Err(err) => {
                debug!(name, attempt = attempt + 1, total, error = %err, "load attempt failed");
                last_error = Some(err);
                if attempt + 1 < total {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    RetryOutcome {
        result: None,
        attempts: total,
        last_error,
    }
}
