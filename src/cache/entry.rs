//! Cache entries and per-query configuration

use crate::retry::RetryConfig;
use crate::CoursetrackError;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of a cached query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Entry exists but nothing has been fetched yet
    Idle,
    /// A fetch is in flight (previous data, if any, is still served)
    Fetching,
    /// The last fetch succeeded
    Success,
    /// The last fetch failed; prior data, if any, is retained
    Error,
}

/// Per-query behavior knobs
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Age after which cached data is served but refetched in the background
    pub stale_after: Duration,

    /// Zero-subscriber inactivity after which the entry is evicted
    pub gc_after: Duration,

    /// When false, the query never fetches; cached state is returned as-is
    pub enabled: bool,

    /// Retry policy for failed fetches
    pub retry: RetryConfig,

    /// Optional per-attempt time budget; expiry counts as a fetch failure
    pub timeout: Option<Duration>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60),
            gc_after: Duration::from_secs(300),
            enabled: true,
            retry: RetryConfig::default(),
            timeout: None,
        }
    }
}

impl QueryConfig {
    /// Set the staleness window
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Set the garbage-collection window
    pub fn with_gc_after(mut self, gc_after: Duration) -> Self {
        self.gc_after = gc_after;
        self
    }

    /// Enable or disable fetching
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One cached resource instance
///
/// Owned by the store; consumers only ever see a [`QuerySnapshot`].
#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub data: Option<Value>,
    pub error: Option<Arc<CoursetrackError>>,
    pub status: QueryStatus,
    /// Timestamp of the last successful write; None means stale
    pub fetched_at: Option<Instant>,
    pub stale_after: Duration,
    pub gc_after: Duration,
    pub subscriber_count: usize,
    /// Set while no subscriber is observing the key; starts the GC countdown
    pub idle_since: Option<Instant>,
    /// Monotonic write counter; answers tagged with an older generation are
    /// discarded
    pub generation: u64,
}

impl CacheEntry {
    pub(crate) fn new(config: &QueryConfig) -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            fetched_at: None,
            stale_after: config.stale_after,
            gc_after: config.gc_after,
            subscriber_count: 0,
            idle_since: Some(Instant::now()),
            generation: 0,
        }
    }

    pub(crate) fn is_stale(&self) -> bool {
        match self.fetched_at {
            Some(at) => at.elapsed() > self.stale_after,
            None => true,
        }
    }

    pub(crate) fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            status: self.status,
            is_stale: self.is_stale(),
            generation: self.generation,
        }
    }
}

/// Point-in-time view of a cache entry
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    /// Last known value, if any
    pub data: Option<Value>,
    /// Last failure, if any
    pub error: Option<Arc<CoursetrackError>>,
    /// Lifecycle state at snapshot time
    pub status: QueryStatus,
    /// Whether the data was older than its staleness window
    pub is_stale: bool,
    /// Generation at snapshot time
    pub generation: u64,
}

impl QuerySnapshot {
    /// Deserialize the cached value, if present
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::Result<Option<T>> {
        match &self.data {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}
