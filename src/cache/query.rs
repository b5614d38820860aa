//! Query coordination
//!
//! Resolves a key to fresh data. Any number of concurrent observers of the
//! same key cause exactly one network operation: the first caller claims the
//! in-flight slot and everyone else joins its outcome through the store.

use super::entry::{QueryConfig, QuerySnapshot, QueryStatus};
use super::inflight::InflightRegistry;
use super::key::QueryKey;
use super::store::{CacheStore, SubscriberGuard};
use crate::retry::with_retry;
use crate::{CoursetrackError, Result};
use futures::future::{AbortRegistration, Abortable};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Entry point to the cache: queries, mutations, invalidation, and GC.
///
/// Cheap to clone; clones share the same store and in-flight registry. There
/// is no global instance — construct one at application start and pass it to
/// consumers.
#[derive(Debug, Clone, Default)]
pub struct QueryClient {
    pub(crate) store: Arc<CacheStore>,
    pub(crate) inflight: Arc<InflightRegistry>,
}

impl QueryClient {
    /// Create a client with an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// The in-flight registry
    pub fn inflight(&self) -> &Arc<InflightRegistry> {
        &self.inflight
    }

    /// Start observing a key without triggering a fetch; the guard keeps the
    /// entry alive until dropped
    pub fn subscribe(&self, key: &QueryKey, config: &QueryConfig) -> SubscriberGuard {
        CacheStore::subscribe(&self.store, key, config)
    }

    /// Observe a key: synchronously returns the current snapshot and a
    /// subscription guard, refetching in the background when the entry is
    /// missing, idle, or stale.
    ///
    /// The old value keeps being served while the refetch runs; consumers
    /// re-read once it settles.
    pub fn observe<F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        config: &QueryConfig,
    ) -> (QuerySnapshot, SubscriberGuard)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let guard = self.subscribe(key, config);
        self.ensure_fresh(key, fetcher, config);

        let snapshot = self.store.get(key).unwrap_or(QuerySnapshot {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_stale: true,
            generation: 0,
        });
        (snapshot, guard)
    }

    /// Start a background fetch when the entry is missing, idle, or stale
    /// and no fetch is already pending. Returns whether a fetch was started.
    pub fn ensure_fresh<F, Fut>(&self, key: &QueryKey, fetcher: F, config: &QueryConfig) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        if !config.enabled {
            return false;
        }

        let needs_fetch = match self.store.get(key) {
            None => true,
            Some(snap) => snap.status == QueryStatus::Idle || snap.is_stale,
        };
        if !needs_fetch || self.inflight.contains(key) {
            return false;
        }

        let generation = self.store.mark_fetching(key, config);
        let Some(ticket) = self.inflight.try_begin(key, generation) else {
            return false;
        };

        tokio::spawn(Self::run_fetch(
            Arc::clone(&self.store),
            Arc::clone(&self.inflight),
            key.clone(),
            fetcher,
            config.clone(),
            generation,
            ticket.registration,
        ));
        true
    }

    /// Awaitable query: joins the pending fetch for the key if one exists,
    /// otherwise starts one, and resolves once the result lands in the cache.
    pub async fn fetch<F, Fut>(&self, key: &QueryKey, fetcher: F, config: &QueryConfig) -> Result<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        if let Some(snap) = self.store.get(key) {
            if snap.status == QueryStatus::Success && !snap.is_stale {
                if let Some(data) = snap.data {
                    return Ok(data);
                }
            }
        }

        if !config.enabled {
            if let Some(data) = self.store.get(key).and_then(|s| s.data) {
                return Ok(data);
            }
            return Err(CoursetrackError::FetchFailed(
                "query is disabled and no cached data exists".to_string(),
            ));
        }

        let fetcher = Arc::new(fetcher);
        loop {
            if let Some(mut done) = self.inflight.join(key) {
                let _ = done.wait_for(|settled| *settled).await;
            } else {
                let generation = self.store.mark_fetching(key, config);
                let Some(ticket) = self.inflight.try_begin(key, generation) else {
                    // Lost the race; join on the next pass
                    continue;
                };

                let shared = Arc::clone(&fetcher);
                tokio::spawn(Self::run_fetch(
                    Arc::clone(&self.store),
                    Arc::clone(&self.inflight),
                    key.clone(),
                    move || (*shared)(),
                    config.clone(),
                    generation,
                    ticket.registration,
                ));

                let mut done = ticket.done;
                let _ = done.wait_for(|settled| *settled).await;
            }

            match self.store.get(key) {
                Some(snap) => match snap.status {
                    QueryStatus::Success => {
                        if let Some(data) = snap.data {
                            return Ok(data);
                        }
                    }
                    QueryStatus::Error => {
                        let msg = snap
                            .error
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "unknown fetch error".to_string());
                        return Err(CoursetrackError::FetchFailed(msg));
                    }
                    // Canceled or superseded mid-flight; go again
                    QueryStatus::Idle | QueryStatus::Fetching => {}
                },
                None => {} // evicted mid-flight; go again
            }
        }
    }

    /// The fetch task: runs the fetcher through the retry policy and writes
    /// the outcome back under the generation captured at start. An aborted
    /// fetch writes nothing.
    async fn run_fetch<F, Fut>(
        store: Arc<CacheStore>,
        inflight: Arc<InflightRegistry>,
        key: QueryKey,
        fetcher: F,
        config: QueryConfig,
        generation: u64,
        registration: AbortRegistration,
    ) where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = key.to_string();
        let operation = with_retry(&config.retry, &name, || {
            let attempt = fetcher();
            let budget = config.timeout;
            async move {
                match budget {
                    Some(limit) => match tokio::time::timeout(limit, attempt).await {
                        Ok(result) => result,
                        Err(_) => Err(CoursetrackError::Timeout(limit)),
                    },
                    None => attempt.await,
                }
            }
        });

        match Abortable::new(operation, registration).await {
            Ok(Ok(data)) => {
                store.write(&key, data, generation);
                inflight.finish(&key, generation);
            }
            Ok(Err(error)) => {
                store.write_error(&key, error, generation);
                inflight.finish(&key, generation);
            }
            Err(_aborted) => {
                tracing::debug!(key = %key, "Fetch aborted, result discarded");
            }
        }
    }

    /// Mark a key stale; the next observation refetches
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.store.invalidate(key)
    }

    /// Mark every key under a prefix stale
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        self.store.invalidate_prefix(prefix)
    }

    /// One garbage-collection pass. Entries with subscribers or a pending
    /// fetch are never evicted.
    pub fn sweep(&self) -> usize {
        self.store.sweep(&self.inflight.keys())
    }

    /// Spawn a background task sweeping at `interval`. The task holds only
    /// weak references and exits once every client clone is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(&self.store);
        let inflight = Arc::downgrade(&self.inflight);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let (Some(store), Some(inflight)) = (store.upgrade(), inflight.upgrade()) else {
                    break;
                };
                let evicted = store.sweep(&inflight.keys());
                if evicted > 0 {
                    tracing::debug!(evicted, "Cache sweep");
                }
            }
        })
    }
}
