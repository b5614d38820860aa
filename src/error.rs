//! Error types for coursetrack
//!
//! One crate-wide error enum covering the cache, API, and CLI layers.
//! Uses thiserror for ergonomic error handling.

use crate::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for coursetrack operations
pub type Result<T> = std::result::Result<T, CoursetrackError>;

/// Comprehensive error type for coursetrack operations
#[derive(Error, Debug)]
pub enum CoursetrackError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session storage errors
    #[error("Session error: {0}")]
    Session(String),

    /// A query's remote fetch failed (after the retry policy was exhausted)
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// A remote write failed; the optimistic update was rolled back
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// The server rejected the credential; the stored session was cleared
    #[error("Unauthorized: credential rejected by the server")]
    Unauthorized,

    /// The operation was superseded and its result discarded
    #[error("Operation canceled")]
    Canceled,

    /// A fetch attempt exceeded its configured time budget
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    /// Rate limited (with retry-after duration in seconds)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl RetryableError for CoursetrackError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            // Retryable: transient network and remote failures
            CoursetrackError::FetchFailed(_) => RetryDecision::Retry,
            CoursetrackError::Timeout(_) => RetryDecision::Retry,
            CoursetrackError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if e.is_status() {
                    match e.status().map(|s| s.as_u16()) {
                        Some(429) => RetryDecision::RetryAfter(Duration::from_secs(60)),
                        Some(500..=599) => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    }
                } else {
                    RetryDecision::Retry
                }
            }
            CoursetrackError::RateLimited(secs) => {
                RetryDecision::RetryAfter(Duration::from_secs(*secs))
            }
            // Non-retryable: permanent failures and local errors
            CoursetrackError::Config(_) => RetryDecision::NoRetry,
            CoursetrackError::Session(_) => RetryDecision::NoRetry,
            CoursetrackError::MutationFailed(_) => RetryDecision::NoRetry,
            CoursetrackError::Unauthorized => RetryDecision::NoRetry,
            CoursetrackError::Canceled => RetryDecision::NoRetry,
            CoursetrackError::Io(_) => RetryDecision::NoRetry,
            CoursetrackError::Json(_) => RetryDecision::NoRetry,
            CoursetrackError::Yaml(_) => RetryDecision::NoRetry,
            CoursetrackError::Anyhow(_) => RetryDecision::NoRetry,
        }
    }
}
