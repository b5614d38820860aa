//! In-flight request registry
//!
//! Tracks the single abortable fetch allowed per key. Concurrent observers
//! join the pending request instead of issuing their own, and a mutation can
//! cancel a conflicting fetch before snapshotting state. Cancellation is
//! cooperative: the underlying future may still run to completion, but its
//! result is dropped by the store's generation guard.

use super::key::QueryKey;
use futures::future::{AbortHandle, AbortRegistration};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::watch;

/// At most one of these exists per key at any instant
#[derive(Debug)]
struct InFlightRequest {
    /// Generation the fetch captured at start; used to match `finish` calls
    generation: u64,
    abort: AbortHandle,
    done_tx: watch::Sender<bool>,
}

/// Handed to the task that won the right to fetch a key
#[derive(Debug)]
pub(crate) struct FetchTicket {
    /// Wraps the fetch future so `cancel` can abort it
    pub registration: AbortRegistration,
    /// Completion channel; the starter shares it with joiners
    pub done: watch::Receiver<bool>,
}

/// Registry of abortable in-flight fetches, one slot per key
#[derive(Debug, Default)]
pub struct InflightRegistry {
    requests: Mutex<HashMap<QueryKey, InFlightRequest>>,
}

impl InflightRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the fetch slot for a key. Returns `None` when a fetch is
    /// already pending, in which case the caller should join it instead.
    pub(crate) fn try_begin(&self, key: &QueryKey, generation: u64) -> Option<FetchTicket> {
        let mut requests = self.requests.lock().unwrap();
        if requests.contains_key(key) {
            return None;
        }

        let (abort, registration) = AbortHandle::new_pair();
        let (done_tx, done_rx) = watch::channel(false);
        requests.insert(
            key.clone(),
            InFlightRequest {
                generation,
                abort,
                done_tx,
            },
        );

        Some(FetchTicket {
            registration,
            done: done_rx,
        })
    }

    /// Completion channel for the pending fetch, if any
    pub(crate) fn join(&self, key: &QueryKey) -> Option<watch::Receiver<bool>> {
        let requests = self.requests.lock().unwrap();
        requests.get(key).map(|r| r.done_tx.subscribe())
    }

    /// Abort the pending fetch for a key and wake its joiners. Returns
    /// whether a fetch was pending. The caller pairs this with the store's
    /// generation bump so a result that slips through is still inert.
    pub fn cancel(&self, key: &QueryKey) -> bool {
        let removed = self.requests.lock().unwrap().remove(key);
        match removed {
            Some(request) => {
                request.abort.abort();
                let _ = request.done_tx.send(true);
                tracing::debug!(key = %key, "Canceled in-flight fetch");
                true
            }
            None => false,
        }
    }

    /// Clear the slot after a fetch settles, waking joiners. A no-op when the
    /// slot has since been canceled or re-claimed by a newer fetch.
    pub(crate) fn finish(&self, key: &QueryKey, generation: u64) {
        let mut requests = self.requests.lock().unwrap();
        if requests.get(key).map(|r| r.generation) == Some(generation) {
            if let Some(request) = requests.remove(key) {
                let _ = request.done_tx.send(true);
            }
        }
    }

    /// True when a fetch is pending for the key
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.requests.lock().unwrap().contains_key(key)
    }

    /// Keys with a pending fetch; the sweeper's protected set
    pub(crate) fn keys(&self) -> HashSet<QueryKey> {
        self.requests.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{Abortable, Aborted};

    fn key(id: i64) -> QueryKey {
        QueryKey::new().part("course").part(id)
    }

    #[test]
    fn test_single_slot_per_key() {
        let registry = InflightRegistry::new();
        let k = key(1);

        let first = registry.try_begin(&k, 0);
        assert!(first.is_some());
        assert!(registry.try_begin(&k, 0).is_none());

        // A different key gets its own slot
        assert!(registry.try_begin(&key(2), 0).is_some());
    }

    #[test]
    fn test_finish_matches_generation() {
        let registry = InflightRegistry::new();
        let k = key(1);

        registry.try_begin(&k, 3).unwrap();
        // A stale finish from a superseded fetch is ignored
        registry.finish(&k, 2);
        assert!(registry.contains(&k));

        registry.finish(&k, 3);
        assert!(!registry.contains(&k));
    }

    #[tokio::test]
    async fn test_cancel_aborts_future_and_wakes_joiners() {
        let registry = InflightRegistry::new();
        let k = key(1);

        let ticket = registry.try_begin(&k, 0).unwrap();
        let mut joiner = registry.join(&k).unwrap();

        let fetch = Abortable::new(
            async {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                42
            },
            ticket.registration,
        );

        assert!(registry.cancel(&k));
        assert_eq!(fetch.await, Err(Aborted));
        assert!(joiner.wait_for(|done| *done).await.is_ok());
        assert!(!registry.contains(&k));
    }

    #[test]
    fn test_protected_keys() {
        let registry = InflightRegistry::new();
        registry.try_begin(&key(1), 0).unwrap();
        registry.try_begin(&key(2), 0).unwrap();

        let keys = registry.keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&key(1)));
    }
}
