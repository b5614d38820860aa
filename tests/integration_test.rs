//! Integration tests for coursetrack
//!
//! These tests verify the cache guarantees end to end: deduplication,
//! staleness, generation ordering, the optimistic-mutation protocol, and
//! garbage collection, plus the session and config lifecycles.

use coursetrack::api::EnrollmentService;
use coursetrack::auth::SessionStore;
use coursetrack::cache::{QueryClient, QueryConfig, QueryKey, QueryStatus};
use coursetrack::config::AppConfig;
use coursetrack::CoursetrackError;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn course_key(id: i64) -> QueryKey {
    QueryKey::new().part("course").part(id)
}

mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_observers_trigger_one_fetch() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = course_key(42);
        let config = QueryConfig::default();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                let calls = Arc::clone(&calls);
                let key = key.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    client
                        .fetch(
                            &key,
                            move || {
                                let calls = Arc::clone(&calls);
                                async move {
                                    calls.fetch_add(1, Ordering::SeqCst);
                                    tokio::time::sleep(Duration::from_millis(30)).await;
                                    Ok(json!({"title": "Intro to Rust"}))
                                }
                            },
                            &config,
                        )
                        .await
                })
            })
            .collect();

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value["title"], "Intro to Rust");
        }

        // Any number of concurrent observers cause exactly one network call
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_staleness_scenario() {
        // Stale-while-revalidate timeline with stale_after=60ms: a fetch at t=0
        // stores v1; an observation inside the window serves the cache with
        // no fetch; one past the window serves v1 immediately while v2 is
        // fetched in the background.
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = course_key(42);
        let config = QueryConfig::default().with_stale_after(Duration::from_millis(60));

        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let generation = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(json!({"title": "X", "generation": generation}))
                }
            }
        };

        // t=0: first observation fetches and stores generation 1
        let value = client.fetch(&key, fetcher.clone(), &config).await.unwrap();
        assert_eq!(value["generation"], 1);

        // t=30: cached data, no new fetch
        tokio::time::sleep(Duration::from_millis(30)).await;
        let (snap, _guard) = client.observe(&key, fetcher.clone(), &config);
        assert_eq!(snap.data.unwrap()["generation"], 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // t=70: old data returned immediately, refetch in flight
        tokio::time::sleep(Duration::from_millis(40)).await;
        let (snap, _guard) = client.observe(&key, fetcher.clone(), &config);
        assert_eq!(snap.data.unwrap()["generation"], 1);
        assert_eq!(snap.status, QueryStatus::Fetching);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let snap = client.store().get(&key).unwrap();
        assert_eq!(snap.data.unwrap()["generation"], 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_generation_ordering_beats_completion_ordering() {
        // Fetch A started first but its answer arrives after B's: the store
        // keeps B's data and discards A's write.
        let client = QueryClient::new();
        let key = course_key(42);

        let generation_a = 0;
        let generation_b = 1;

        assert!(client.store().write(&key, json!({"from": "B"}), generation_b));
        assert!(!client.store().write(&key, json!({"from": "A"}), generation_a));

        assert_eq!(client.store().get(&key).unwrap().data.unwrap()["from"], "B");
    }

    #[tokio::test]
    async fn test_optimistic_rollback_restores_prior_value() {
        let client = QueryClient::new();
        let key = EnrollmentService::enrolled_key(7);
        client.store().write(&key, json!(false), 0);

        let outcome: coursetrack::Result<()> = client
            .mutate(
                vec![key.clone()],
                |store| store.set_data(&key, json!(true)),
                async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err(CoursetrackError::FetchFailed(
                        "enrollment rejected".to_string(),
                    ))
                },
            )
            .await;

        assert!(matches!(
            outcome,
            Err(CoursetrackError::MutationFailed(_))
        ));
        assert_eq!(client.store().get(&key).unwrap().data.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_settlement_forces_a_refetch() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = EnrollmentService::enrolled_key(7);
        let config = QueryConfig::default();

        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!(true)) }
            }
        };

        // Populate, then mutate successfully
        client.fetch(&key, fetcher.clone(), &config).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _: coursetrack::Result<()> = client
            .mutate(
                vec![key.clone()],
                |store| store.set_data(&key, json!(true)),
                async { Ok(()) },
            )
            .await;

        // The key settled stale: the next observation hits the network again
        assert!(client.store().get(&key).unwrap().is_stale);
        client.fetch(&key, fetcher.clone(), &config).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gc_evicts_unobserved_entries() {
        let client = QueryClient::new();
        let key = course_key(42);
        let config = QueryConfig::default()
            .with_gc_after(Duration::from_millis(30))
            .with_stale_after(Duration::from_secs(60));

        let guard = client.subscribe(&key, &config);
        client.store().write(&key, json!({"title": "X"}), 0);

        // Subscribed: survives any number of sweeps
        std::thread::sleep(Duration::from_millis(40));
        client.sweep();
        assert!(client.store().contains(&key));

        // Unsubscribed: evicted once the countdown expires
        drop(guard);
        tokio::time::sleep(Duration::from_millis(40)).await;
        client.sweep();
        assert!(!client.store().contains(&key));
    }

    #[tokio::test]
    async fn test_resubscribing_cancels_eviction() {
        let client = QueryClient::new();
        let key = course_key(42);
        let config = QueryConfig::default().with_gc_after(Duration::from_millis(30));

        let guard = client.subscribe(&key, &config);
        client.store().write(&key, json!({"title": "X"}), 0);
        drop(guard);

        // Countdown running; a new observer arrives in time
        let _guard = client.subscribe(&key, &config);
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.sweep();
        assert!(client.store().contains(&key));
    }

    #[tokio::test]
    async fn test_background_sweeper_runs_until_client_drops() {
        let client = QueryClient::new();
        let key = course_key(42);
        let config = QueryConfig::default().with_gc_after(Duration::from_millis(10));

        let guard = client.subscribe(&key, &config);
        client.store().write(&key, json!({"title": "X"}), 0);
        drop(guard);

        let sweeper = client.spawn_sweeper(Duration::from_millis(15));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!client.store().contains(&key));

        // Dropping every clone stops the sweeper task
        drop(client);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(sweeper.is_finished());
    }

    #[tokio::test]
    async fn test_invalidate_prefix_marks_every_page_stale() {
        let client = QueryClient::new();
        let page1 = QueryKey::new().part("courses").part(1);
        let page2 = QueryKey::new().part("courses").part(2);
        let detail = course_key(42);

        client.store().write(&page1, json!([]), 0);
        client.store().write(&page2, json!([]), 0);
        client.store().write(&detail, json!({}), 0);

        assert_eq!(client.invalidate_prefix(&QueryKey::new().part("courses")), 2);
        assert!(client.store().get(&page1).unwrap().is_stale);
        assert!(client.store().get(&page2).unwrap().is_stale);
        assert!(!client.store().get(&detail).unwrap().is_stale);
    }
}

mod session_tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::open(&path).unwrap();
        assert!(!store.is_authenticated());

        let session = store.login("student@example.com").unwrap();
        assert!(store.is_authenticated());

        // A new store instance picks up the persisted session
        let reopened = SessionStore::open(&path).unwrap();
        assert_eq!(reopened.get().unwrap().token, session.token);

        reopened.clear();
        assert!(!reopened.is_authenticated());
        assert!(!path.exists());
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_creation_and_save() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = AppConfig::new();
        config.api.base_url = "http://courses.test:3000".to_string();
        config.cache.courses_stale_secs = 15;
        config.save(&config_path).unwrap();

        let loaded = AppConfig::load(&config_path).unwrap();
        assert_eq!(loaded.api.base_url, "http://courses.test:3000");
        assert_eq!(loaded.cache.courses_stale_secs, 15);

        let query_config = loaded.courses_list_config();
        assert_eq!(query_config.stale_after, Duration::from_secs(15));
    }
}
