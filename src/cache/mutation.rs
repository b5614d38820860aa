//! Mutation coordination
//!
//! A mutation applies a provisional local write immediately, performs the
//! remote write, rolls the cache back if the remote rejects it, and always
//! finishes by marking the affected keys stale so the next observation
//! re-fetches server truth. The phases run in a fixed order; see
//! [`QueryClient::mutate`].

use super::key::QueryKey;
use super::query::QueryClient;
use super::store::CacheStore;
use crate::{CoursetrackError, Result};
use serde_json::Value;
use std::future::Future;

/// Snapshot of the affected entries taken before the optimistic apply.
/// Lives only for the duration of one `mutate` call.
struct MutationContext {
    snapshots: Vec<(QueryKey, Option<Option<Value>>)>,
}

impl MutationContext {
    fn capture(store: &CacheStore, keys: &[QueryKey]) -> Self {
        Self {
            snapshots: keys
                .iter()
                .map(|key| (key.clone(), store.data_snapshot(key)))
                .collect(),
        }
    }

    /// Restore every affected key to the state this mutation observed at its
    /// own start. An entry that did not exist is removed again.
    fn rollback(self, store: &CacheStore) {
        for (key, prior) in self.snapshots {
            match prior {
                None => {
                    store.evict(&key);
                }
                Some(data) => store.restore(&key, data),
            }
        }
    }
}

impl QueryClient {
    /// Execute a remote write with an optimistic local update.
    ///
    /// Protocol, in order:
    /// 1. Cancel any in-flight fetch for the affected keys and abandon their
    ///    generations, so a late result cannot overwrite the optimistic value.
    /// 2. Snapshot each affected entry's data.
    /// 3. Run `optimistic`, which writes provisional values through
    ///    [`CacheStore::set_data`].
    /// 4. Await `remote_op`.
    /// 5. On failure, roll every affected key back to its snapshot and
    ///    surface [`CoursetrackError::MutationFailed`] to the caller.
    /// 6. Settle — always, success or failure: mark every affected key stale
    ///    so the next observation fetches authoritative data.
    ///
    /// With no affected keys the cache steps are no-ops but `remote_op`
    /// still executes. Overlapping mutations are permitted; each one only
    /// ever restores to the state it observed itself.
    pub async fn mutate<T, Op>(
        &self,
        affected: Vec<QueryKey>,
        optimistic: impl FnOnce(&CacheStore),
        remote_op: Op,
    ) -> Result<T>
    where
        Op: Future<Output = Result<T>>,
    {
        for key in &affected {
            self.inflight.cancel(key);
            self.store.mark_abandoned(key);
        }

        let context = MutationContext::capture(&self.store, &affected);

        optimistic(&self.store);

        let result = remote_op.await;

        if result.is_err() {
            tracing::debug!(keys = affected.len(), "Mutation failed, rolling back");
            context.rollback(&self.store);
        }

        // Settle runs exactly once per mutation regardless of outcome
        for key in &affected {
            self.store.invalidate(key);
        }

        match result {
            Ok(value) => Ok(value),
            // The interceptor already cleared the credential; keep the error
            // distinguishable for the caller
            Err(CoursetrackError::Unauthorized) => Err(CoursetrackError::Unauthorized),
            Err(e) => Err(CoursetrackError::MutationFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{QueryConfig, QueryStatus};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn enrolled_key(course_id: i64) -> QueryKey {
        QueryKey::new().part("enrolled").part(course_id)
    }

    #[tokio::test]
    async fn test_failed_mutation_rolls_back_and_surfaces_error() {
        let client = QueryClient::new();
        let k = enrolled_key(7);
        client.store().write(&k, json!(false), 0);

        let result: Result<()> = client
            .mutate(
                vec![k.clone()],
                |store| store.set_data(&k, json!(true)),
                async { Err(CoursetrackError::FetchFailed("500".to_string())) },
            )
            .await;

        assert!(matches!(result, Err(CoursetrackError::MutationFailed(_))));
        let snap = client.store().get(&k).unwrap();
        assert_eq!(snap.data.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_successful_mutation_keeps_optimistic_value_until_refetch() {
        let client = QueryClient::new();
        let k = enrolled_key(7);
        client.store().write(&k, json!(false), 0);

        let result: Result<i64> = client
            .mutate(
                vec![k.clone()],
                |store| store.set_data(&k, json!(true)),
                async { Ok(99) },
            )
            .await;

        assert_eq!(result.unwrap(), 99);
        let snap = client.store().get(&k).unwrap();
        assert_eq!(snap.data.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_settle_marks_affected_keys_stale_on_any_outcome() {
        let client = QueryClient::new();
        let ok_key = enrolled_key(1);
        let err_key = enrolled_key(2);
        client.store().write(&ok_key, json!(false), 0);
        client.store().write(&err_key, json!(false), 0);

        let _: Result<()> = client
            .mutate(vec![ok_key.clone()], |_| {}, async { Ok(()) })
            .await;
        let _: Result<()> = client
            .mutate(vec![err_key.clone()], |_| {}, async {
                Err(CoursetrackError::FetchFailed("boom".to_string()))
            })
            .await;

        assert!(client.store().get(&ok_key).unwrap().is_stale);
        assert!(client.store().get(&err_key).unwrap().is_stale);
    }

    #[tokio::test]
    async fn test_empty_affected_keys_still_runs_remote_op() {
        let client = QueryClient::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        let result: Result<()> = client
            .mutate(Vec::new(), |_| {}, async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_rollback_removes_entry_that_did_not_exist() {
        let client = QueryClient::new();
        let k = enrolled_key(7);
        assert!(client.store().get(&k).is_none());

        let result: Result<()> = client
            .mutate(
                vec![k.clone()],
                |store| store.set_data(&k, json!(true)),
                async { Err(CoursetrackError::FetchFailed("boom".to_string())) },
            )
            .await;

        assert!(result.is_err());
        assert!(client.store().get(&k).is_none());
    }

    #[tokio::test]
    async fn test_mutation_cancels_conflicting_fetch() {
        let client = QueryClient::new();
        let k = enrolled_key(7);
        let config = QueryConfig::default();

        // Slow fetch that would report "not enrolled"
        client.ensure_fresh(
            &k,
            || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!(false))
            },
            &config,
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.inflight().contains(&k));

        let result: Result<()> = client
            .mutate(
                vec![k.clone()],
                |store| store.set_data(&k, json!(true)),
                async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(())
                },
            )
            .await;
        assert!(result.is_ok());

        // Give the canceled fetch time to have completed, had it survived
        tokio::time::sleep(Duration::from_millis(80)).await;
        let snap = client.store().get(&k).unwrap();
        assert_eq!(snap.data.unwrap(), json!(true));
        // Settled: next observation refetches server truth
        assert!(snap.is_stale);
    }

    #[tokio::test]
    async fn test_overlapping_mutations_restore_their_own_snapshots() {
        let client = QueryClient::new();
        let k = enrolled_key(7);
        client.store().write(&k, json!("initial"), 0);

        // First mutation applies "first" and hangs until released
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let first = {
            let client = client.clone();
            let k = k.clone();
            tokio::spawn(async move {
                let out: Result<()> = client
                    .mutate(
                        vec![k.clone()],
                        |store| store.set_data(&k, json!("first")),
                        async {
                            let _ = release_rx.await;
                            Err(CoursetrackError::FetchFailed("rejected".to_string()))
                        },
                    )
                    .await;
                out
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.store().get(&k).unwrap().data.unwrap(), json!("first"));

        // Second mutation snapshots the first's optimistic value and fails
        let second: Result<()> = client
            .mutate(
                vec![k.clone()],
                |store| store.set_data(&k, json!("second")),
                async { Err(CoursetrackError::FetchFailed("rejected".to_string())) },
            )
            .await;
        assert!(second.is_err());
        // Rolled back to what it observed: the first mutation's value
        assert_eq!(client.store().get(&k).unwrap().data.unwrap(), json!("first"));

        // First mutation now fails and restores its own snapshot
        let _ = release_tx.send(());
        assert!(first.await.unwrap().is_err());
        assert_eq!(
            client.store().get(&k).unwrap().data.unwrap(),
            json!("initial")
        );

        let snap = client.store().get(&k).unwrap();
        assert_ne!(snap.status, QueryStatus::Fetching);
    }
}
