//! In-memory cache store
//!
//! Keyed table of cache entries. Owns the entry lifecycle: generation-guarded
//! writes, subscriber counting, staleness marking, and garbage collection.
//! Every operation is a single non-suspending critical section, so ordering
//! between interleaved async completions is enforced purely by the
//! generation guard.

use super::entry::{CacheEntry, QueryConfig, QuerySnapshot, QueryStatus};
use super::key::QueryKey;
use crate::CoursetrackError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Keyed table of cache entries
///
/// Explicitly constructed and shared via `Arc`; there is no process-wide
/// singleton. All mutation goes through `write`/`write_error`/`evict` and
/// the mutation-protocol helpers.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
}

impl CacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current state of a key. No side effects.
    pub fn get(&self, key: &QueryKey) -> Option<QuerySnapshot> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map(|e| e.snapshot())
    }

    /// True when an entry exists for the key
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True when the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a successful fetch result.
    ///
    /// Applied only when `generation` is at least the entry's current
    /// generation; an answer to a superseded request is discarded. An
    /// accepted write bumps the stored generation past the tag. Returns
    /// whether the write was applied.
    pub fn write(&self, key: &QueryKey, data: Value, generation: u64) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(&QueryConfig::default()));

        if generation < entry.generation {
            tracing::debug!(
                key = %key,
                generation,
                current = entry.generation,
                "Discarding superseded fetch result"
            );
            return false;
        }

        entry.data = Some(data);
        entry.error = None;
        entry.status = QueryStatus::Success;
        entry.fetched_at = Some(Instant::now());
        entry.generation = generation + 1;
        tracing::debug!(key = %key, generation = entry.generation, "Cache write");
        true
    }

    /// Record a failed fetch. Same generation guard as [`CacheStore::write`];
    /// prior data is retained (stale-while-error).
    pub fn write_error(&self, key: &QueryKey, error: CoursetrackError, generation: u64) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(&QueryConfig::default()));

        if generation < entry.generation {
            tracing::debug!(
                key = %key,
                generation,
                current = entry.generation,
                "Discarding superseded fetch error"
            );
            return false;
        }

        tracing::debug!(key = %key, error = %error, "Cache error write");
        entry.error = Some(Arc::new(error));
        entry.status = QueryStatus::Error;
        entry.generation = generation + 1;
        true
    }

    /// Write a value directly, superseding any in-flight fetch for the key.
    ///
    /// This is the optimistic-apply primitive: the generation is bumped
    /// unconditionally, so a fetch that started earlier can no longer clobber
    /// the value.
    pub fn set_data(&self, key: &QueryKey, data: Value) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(&QueryConfig::default()));

        entry.data = Some(data);
        entry.error = None;
        entry.status = QueryStatus::Success;
        entry.fetched_at = Some(Instant::now());
        entry.generation += 1;
        tracing::debug!(key = %key, generation = entry.generation, "Local write");
    }

    /// Restore an entry's data to a mutation snapshot (rollback).
    ///
    /// Bumps the generation so any fetch started mid-mutation is superseded.
    /// Freshness is not restored; the settle step invalidates anyway.
    pub(crate) fn restore(&self, key: &QueryKey, prior: Option<Value>) {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        entry.status = if prior.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        };
        entry.data = prior;
        entry.error = None;
        entry.fetched_at = None;
        entry.generation += 1;
        tracing::debug!(key = %key, "Rolled back to snapshot");
    }

    /// The entry's prior data for a mutation snapshot: `None` when no entry
    /// exists, otherwise the (possibly absent) cached value.
    pub(crate) fn data_snapshot(&self, key: &QueryKey) -> Option<Option<Value>> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map(|e| e.data.clone())
    }

    /// Bump the generation without touching data, so a result captured under
    /// the old generation is dropped by the guard even though the underlying
    /// operation could not be aborted. A dangling `Fetching` status is
    /// demoted to what the data supports.
    pub(crate) fn mark_abandoned(&self, key: &QueryKey) {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        entry.generation += 1;
        if entry.status == QueryStatus::Fetching {
            entry.status = if entry.data.is_some() {
                QueryStatus::Success
            } else {
                QueryStatus::Idle
            };
        }
        tracing::debug!(key = %key, generation = entry.generation, "Generation abandoned");
    }

    /// Ensure an entry exists with the query's configuration, mark it
    /// `Fetching`, and return the generation a fetch started now must tag its
    /// result with.
    pub(crate) fn mark_fetching(&self, key: &QueryKey, config: &QueryConfig) -> u64 {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(config));

        entry.stale_after = config.stale_after;
        entry.gc_after = config.gc_after;
        entry.status = QueryStatus::Fetching;
        entry.generation
    }

    /// Start observing a key. Creates an idle entry if none exists and
    /// increments the subscriber count; the returned guard decrements it on
    /// drop, and a count reaching zero starts the `gc_after` countdown.
    pub fn subscribe(store: &Arc<Self>, key: &QueryKey, config: &QueryConfig) -> SubscriberGuard {
        let mut entries = store.entries.lock().unwrap();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(config));

        entry.stale_after = config.stale_after;
        entry.gc_after = config.gc_after;
        entry.subscriber_count += 1;
        entry.idle_since = None;

        SubscriberGuard {
            store: Arc::clone(store),
            key: key.clone(),
        }
    }

    fn unsubscribe(&self, key: &QueryKey) {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        if entry.subscriber_count == 0 {
            entry.idle_since = Some(Instant::now());
        }
    }

    /// Current subscriber count for a key
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map(|e| e.subscriber_count).unwrap_or(0)
    }

    /// Remove an entry unconditionally
    pub fn evict(&self, key: &QueryKey) -> bool {
        let removed = self.entries.lock().unwrap().remove(key).is_some();
        if removed {
            tracing::debug!(key = %key, "Evicted");
        }
        removed
    }

    /// Mark an entry stale; data is retained and refetched on the next
    /// observation. Returns whether an entry existed.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.fetched_at = None;
                tracing::debug!(key = %key, "Invalidated");
                true
            }
            None => false,
        }
    }

    /// Mark every entry whose key starts with `prefix` stale. Returns the
    /// number of entries affected.
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.fetched_at = None;
                count += 1;
            }
        }
        if count > 0 {
            tracing::debug!(prefix = %prefix, count, "Invalidated by prefix");
        }
        count
    }

    /// One garbage-collection pass.
    ///
    /// Evicts entries whose zero-subscriber countdown has expired. Entries
    /// with subscribers, and keys in `protected` (those with a pending
    /// fetch), are never evicted. Returns the number of entries removed.
    pub fn sweep(&self, protected: &HashSet<QueryKey>) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, entry| {
            if entry.subscriber_count > 0 || protected.contains(key) {
                return true;
            }
            match entry.idle_since {
                Some(idle) => idle.elapsed() <= entry.gc_after,
                None => true,
            }
        });
        before - entries.len()
    }
}

/// Handle returned by [`CacheStore::subscribe`]; dropping it decrements the
/// key's subscriber count
#[derive(Debug)]
pub struct SubscriberGuard {
    store: Arc<CacheStore>,
    key: QueryKey,
}

impl SubscriberGuard {
    /// The observed key
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.store.unsubscribe(&self.key);
    }
}
