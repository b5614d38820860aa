//! Retry with exponential backoff for remote calls
//!
//! Query fetches retry transient failures a capped number of times with
//! exponential backoff and jitter. Mutations never go through this path.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Add random jitter to prevent thundering herd
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Disable retries entirely (single attempt)
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a config for quick retries (short backoff, useful in tests)
    pub fn quick() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Set the maximum retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Calculate backoff duration for a given attempt
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff().as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff().as_secs_f64());

        let final_duration = if self.jitter {
            // 0-25% jitter
            capped * (1.0 + rand_jitter() * 0.25)
        } else {
            capped
        };

        Duration::from_secs_f64(final_duration)
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0) without an external dependency
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// Retry classification for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation
    Retry,
    /// Retry after a specific duration (e.g., from a Retry-After header)
    RetryAfter(Duration),
    /// Don't retry, the error is permanent
    NoRetry,
}

/// Trait for errors that can indicate whether to retry
pub trait RetryableError {
    /// Determine if this error should be retried
    fn retry_decision(&self) -> RetryDecision;
}

/// Execute an async operation with retry logic
///
/// Returns the result of the operation, or the last error once the retry
/// budget is exhausted or a non-retryable error occurs.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let decision = e.retry_decision();

                match decision {
                    RetryDecision::NoRetry => {
                        debug!(
                            operation = operation_name,
                            attempt, "Operation failed with non-retryable error: {}", e
                        );
                        return Err(e);
                    }
                    RetryDecision::Retry | RetryDecision::RetryAfter(_) => {
                        if attempt >= config.max_retries {
                            warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                "Operation failed after {} attempts: {}",
                                attempt + 1,
                                e
                            );
                            return Err(e);
                        }

                        let backoff = match decision {
                            RetryDecision::RetryAfter(d) => d.min(config.max_backoff()),
                            _ => config.backoff_duration(attempt),
                        };

                        warn!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            max_attempts = config.max_retries + 1,
                            backoff_secs = backoff.as_secs_f64(),
                            "Retrying after error: {}",
                            e
                        );

                        sleep(backoff).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}
