//! End-to-end behaviour of the metadata service against the in-memory store

use metasync_cache::{
    Dispatcher, DrainPhase, FlushResult, LoggingPolicy, MetaService, ObserveOutcome,
};
use metasync_config::PolicyConfig;
use metasync_core::{Error, MetaRecord};
use metasync_store::{Collection, MemoryStore, MetaStore, SiblingRecord};
use metasync_utils::RetryConfig;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const REFRESH: Duration = Duration::from_secs(60);

fn service_on(store: &Arc<MemoryStore>) -> MetaService {
    MetaService::builder()
        .with_store(store.clone())
        .with_refresh_interval(REFRESH)
        .with_backoff(RetryConfig::immediate())
        .build()
        .unwrap()
}

async fn stored(store: &MemoryStore, name: &str) -> MetaRecord {
    store.read(name).await.unwrap().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_cpu_load_example() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    for value in [10.0, 50.0, 5.0] {
        service.observe("cpu.load", value).await.unwrap();
    }
    service.flush_all().await.unwrap();

    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.min, record.max, record.count), (5.0, 50.0, 3));
    assert_eq!(record.version, 1);

    service.observe("cpu.load", 60.0).await.unwrap();
    assert_eq!(service.flush_all().await.unwrap(), 1);

    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.min, record.max, record.count), (5.0, 60.0, 4));
    assert_eq!(record.version, 2);
    assert_eq!(service.get("cpu.load").await.unwrap(), record);
}

#[tokio::test(start_paused = true)]
async fn test_new_metric_is_flushed_without_waiting() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    let outcome = service.observe("cpu.load", 42.0).await.unwrap();
    assert_eq!(outcome, ObserveOutcome::Created);

    tokio::time::sleep(Duration::from_millis(1)).await;

    let record = stored(&store, "cpu.load").await;
    assert_eq!(record.version, 1);
    assert_eq!(record.count, 1);
    assert!(service.dirty_metrics().is_empty());
    assert!(service.dispatcher().is_activated("cpu.load"));
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_updates_is_one_write() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    service.observe("cpu.load", 0.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(store.stats().updates, 1);

    for i in 1..=100 {
        let outcome = service.observe("cpu.load", f64::from(i)).await.unwrap();
        assert_eq!(outcome, ObserveOutcome::Updated);
    }
    assert_eq!(service.dirty_metrics(), vec!["cpu.load"]);

    tokio::time::sleep(REFRESH - Duration::from_secs(1)).await;
    assert_eq!(store.stats().updates, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.stats().updates, 2);

    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.min, record.max, record.count), (0.0, 100.0, 101));
    assert_eq!(record.version, 2);
    assert!(service.dirty_metrics().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_updates_after_a_flush_schedule_again() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    service.observe("cpu.load", 1.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    service.observe("cpu.load", 2.0).await.unwrap();

    tokio::time::sleep(REFRESH + Duration::from_secs(1)).await;
    service.observe("cpu.load", 3.0).await.unwrap();
    assert_eq!(service.dirty_metrics(), vec!["cpu.load"]);

    tokio::time::sleep(REFRESH + Duration::from_secs(1)).await;
    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.max, record.count, record.version), (3.0, 3, 3));
}

#[tokio::test(start_paused = true)]
async fn test_update_during_a_sync_is_scheduled_again() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    service.observe("cpu.load", 1.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    store.set_read_delay(Duration::from_secs(5));
    service.observe("cpu.load", 2.0).await.unwrap();

    // The debounced flush fires and is now suspended in the store read
    tokio::time::sleep(REFRESH + Duration::from_secs(1)).await;
    let observer = tokio::spawn({
        let service = service.clone();
        async move { service.observe("cpu.load", 3.0).await }
    });

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(observer.await.unwrap().unwrap(), ObserveOutcome::Updated);
    assert_eq!(service.dirty_metrics(), vec!["cpu.load"]);
    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.max, record.count, record.version), (2.0, 2, 2));

    tokio::time::sleep(REFRESH).await;
    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.max, record.count, record.version), (3.0, 3, 3));
    assert!(service.dirty_metrics().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_peer_record_is_merged() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&MetaRecord {
            id: "cpu.load".to_string(),
            version: 9,
            min: -1.0,
            max: 200.0,
            count: 500,
        })
        .await
        .unwrap();
    let service = service_on(&store);

    service.observe("cpu.load", 10.0).await.unwrap();
    service.observe("cpu.load", 300.0).await.unwrap();
    service.flush_all().await.unwrap();

    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.min, record.max, record.count), (-1.0, 300.0, 500));
    assert_eq!(record.version, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_both_land() {
    let store = Arc::new(MemoryStore::new());
    let backoff = RetryConfig::new(Duration::from_millis(1), Duration::from_millis(10), 0.5);
    let writer = |store: &Arc<MemoryStore>| {
        MetaService::builder()
            .with_store(store.clone())
            .with_refresh_interval(REFRESH)
            .with_backoff(backoff.clone())
            .build()
            .unwrap()
    };
    let a = writer(&store);
    let b = writer(&store);

    let left = [1.0, 2.0, 3.0, 4.0, 5.0];
    let right = [-10.0, 100.0, 7.0];
    let feed_a = async {
        for value in left {
            a.observe("disk.io", value).await.unwrap();
        }
    };
    let feed_b = async {
        for value in right {
            b.observe("disk.io", value).await.unwrap();
        }
    };
    tokio::join!(feed_a, feed_b);

    let (ra, rb) = tokio::join!(a.flush_all(), b.flush_all());
    ra.unwrap();
    rb.unwrap();
    a.drain_and_stop().await.unwrap();
    b.drain_and_stop().await.unwrap();

    let record = stored(&store, "disk.io").await;
    assert_eq!(record.min, -10.0);
    assert_eq!(record.max, 100.0);
    assert_eq!(record.count, left.len() as u64);
    assert!(record.version >= 2);
    assert_eq!(store.stats().updates, record.version);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_observers_on_one_service_lose_nothing() {
    const TASKS: u32 = 16;
    const PER_TASK: u32 = 500;

    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    let observers: Vec<_> = (0..TASKS)
        .map(|task| {
            let service = service.clone();
            tokio::spawn(async move {
                for i in 0..PER_TASK {
                    let value = f64::from(task * 1000 + i);
                    service.observe("net.rx", value).await.unwrap();
                }
            })
        })
        .collect();
    for observer in futures::future::join_all(observers).await {
        observer.unwrap();
    }
    service.drain_and_stop().await.unwrap();

    let expected_max = f64::from((TASKS - 1) * 1000 + PER_TASK - 1);
    let cached = service.get("net.rx").await.unwrap();
    assert_eq!(cached.count, u64::from(TASKS * PER_TASK));
    assert_eq!((cached.min, cached.max), (0.0, expected_max));

    let record = stored(&store, "net.rx").await;
    assert_eq!(record, cached);
    assert!(service.dirty_metrics().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_drain_flushes_everything_once() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    for name in ["cpu.load", "mem.free", "disk.io"] {
        service.observe(name, 1.0).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    service.observe("cpu.load", 9.0).await.unwrap();
    service.observe("mem.free", -9.0).await.unwrap();
    assert_eq!(service.dirty_metrics(), vec!["cpu.load", "mem.free"]);

    service.drain_and_stop().await.unwrap();

    assert_eq!(service.phase(), DrainPhase::Stopped);
    assert!(service.dirty_metrics().is_empty());
    for aggregate in service.snapshot().await {
        assert_eq!(stored(&store, &aggregate.id).await, aggregate);
    }
    let writes = store.stats().updates;
    assert_eq!(writes, 5);

    service.drain_and_stop().await.unwrap();
    tokio::time::sleep(REFRESH * 2).await;
    assert_eq!(store.stats().updates, writes);
    assert!(matches!(service.flush_all().await, Err(Error::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_keeps_metric_dirty() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);
    store.set_available(false);

    service.observe("cpu.load", 1.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(service.dirty_metrics(), vec!["cpu.load"]);

    let err = service.flush_all().await.unwrap_err();
    assert!(matches!(err, Error::FlushIncomplete { ref failed } if failed == &["cpu.load"]));

    store.set_available(true);
    tokio::time::sleep(REFRESH + Duration::from_secs(1)).await;

    assert!(service.dirty_metrics().is_empty());
    assert_eq!(stored(&store, "cpu.load").await.version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_drain_gives_up_on_unreachable_store() {
    let store = Arc::new(MemoryStore::new());
    let service = MetaService::builder()
        .with_store(store.clone())
        .with_backoff(RetryConfig::immediate())
        .with_drain_attempts(2)
        .build()
        .unwrap();
    store.set_available(false);
    service.observe("cpu.load", 1.0).await.unwrap();

    let err = service.drain_and_stop().await.unwrap_err();

    assert!(matches!(err, Error::FlushIncomplete { ref failed } if failed == &["cpu.load"]));
    assert_eq!(service.phase(), DrainPhase::Stopped);
    assert!(service.dirty_metrics().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_failing_during_drain_leaves_nothing_dirty() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    service.observe("cpu.load", 1.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    store.set_read_delay(Duration::from_secs(5));
    store.fail_reads(1);
    service.observe("cpu.load", 2.0).await.unwrap();

    // The debounced flush holds the aggregate while its read is pending,
    // then fails while the drain waits for the same aggregate
    tokio::time::sleep(REFRESH + Duration::from_secs(1)).await;
    service.drain_and_stop().await.unwrap();

    assert_eq!(service.phase(), DrainPhase::Stopped);
    assert!(service.dirty_metrics().is_empty());
    let record = stored(&store, "cpu.load").await;
    assert_eq!((record.max, record.count, record.version), (2.0, 2, 2));

    let writes = store.stats().updates;
    tokio::time::sleep(REFRESH * 3).await;
    assert!(service.dirty_metrics().is_empty());
    assert_eq!(store.stats().updates, writes);
}

#[tokio::test(start_paused = true)]
async fn test_single_flush_after_drain_is_refused() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);
    service.observe("cpu.load", 1.0).await.unwrap();
    service.drain_and_stop().await.unwrap();

    assert!(matches!(service.flush("cpu.load").await, Err(Error::Stopped)));
    assert!(matches!(service.flush("mem.free").await, Err(Error::Stopped)));
    assert!(service.dirty_metrics().is_empty());
    assert_eq!(store.stats().updates, 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_removes_every_trace() {
    let store = Arc::new(MemoryStore::new());
    let service = service_on(&store);

    service.observe("cpu.load", 1.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    service.observe("cpu.load", 2.0).await.unwrap();
    service.observe("mem.free", 5.0).await.unwrap();
    for collection in [Collection::Observations, Collection::Observations, Collection::Windows] {
        store
            .insert_sibling(collection, SiblingRecord::new("cpu.load", json!({ "v": 1 })))
            .await
            .unwrap();
    }

    let report = service.delete_metric("cpu.load").await.unwrap();

    assert!(report.meta_removed);
    assert_eq!(report.observations_removed, 2);
    assert_eq!(report.windows_removed, 1);
    assert!(service.get("cpu.load").await.is_none());
    assert!(!service.dirty_metrics().contains(&"cpu.load".to_string()));
    assert!(!service.dispatcher().is_activated("cpu.load"));

    tokio::time::sleep(REFRESH * 2).await;
    assert!(store.read("cpu.load").await.unwrap().is_none());
    assert_eq!(store.count_siblings("cpu.load").await.unwrap(), 0);
    assert!(store.read("mem.free").await.unwrap().is_some());

    assert_eq!(
        service.observe("cpu.load", 3.0).await.unwrap(),
        ObserveOutcome::Created
    );
}

#[tokio::test(start_paused = true)]
async fn test_load_seeds_cache_and_activates_once() {
    let store = Arc::new(MemoryStore::new());
    for (name, version) in [("cpu.load", 3), ("mem.free", 1)] {
        store
            .insert(&MetaRecord {
                id: name.to_string(),
                version,
                min: 0.0,
                max: 10.0,
                count: 7,
            })
            .await
            .unwrap();
    }
    let policy = Arc::new(LoggingPolicy::new(".*", PolicyConfig::default()));
    let service = MetaService::builder()
        .with_store(store.clone())
        .with_dispatcher(Dispatcher::new().route(".*", policy.clone()).unwrap())
        .with_refresh_interval(REFRESH)
        .build()
        .unwrap();

    assert_eq!(service.load().await.unwrap(), 2);
    assert!(service.dirty_metrics().is_empty());
    assert_eq!(service.get("cpu.load").await.unwrap().version, 3);
    assert!(policy.is_started());

    assert_eq!(
        service.observe("cpu.load", 11.0).await.unwrap(),
        ObserveOutcome::Updated
    );
    assert_eq!(
        service.flush("cpu.load").await.unwrap(),
        FlushResult::Persisted { version: 4 }
    );
    assert_eq!(service.flush("cpu.load").await.unwrap(), FlushResult::Skipped);

    let mut activated = policy.metrics();
    activated.sort();
    assert_eq!(activated, vec!["cpu.load", "mem.free"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_flushed_aggregate_matches_observations(
        values in prop::collection::vec(-1.0e9f64..1.0e9, 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let record = runtime.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let service = service_on(&store);
            for value in &values {
                service.observe("prop.metric", *value).await.unwrap();
            }
            service.flush_all().await.unwrap();
            stored(&store, "prop.metric").await
        });

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(record.min, min);
        prop_assert_eq!(record.max, max);
        prop_assert_eq!(record.count, values.len() as u64);
    }
}
