//! Concurrency tests for the metric stores
//!
//! These tests verify that:
//! - Concurrent writers each receive a distinct row id
//! - Readers running alongside writers never see partial rows
//! - Cleanup can race with ingestion without losing fresh rows

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use hostpulse::storage::{MetricStore, memory::MemoryStore};

use crate::helpers::create_test_payload;

const WRITERS: usize = 50;

async fn assert_distinct_ids(store: Arc<dyn MetricStore>) {
    let writes = (0..WRITERS).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            let payload = create_test_payload(&format!("host-{}", i % 5), i as f64, 50.0);
            store.store(&payload).await.unwrap()
        })
    });

    let ids: Vec<i64> = join_all(writes)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();

    let unique: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), WRITERS);

    let rows = store.recent(None, 1).await.unwrap();
    assert_eq!(rows.len(), WRITERS);
    assert_eq!(store.summary(None, 1).await.unwrap().total_records, WRITERS as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_store_concurrent_writes() {
    assert_distinct_ids(Arc::new(MemoryStore::new())).await;
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_store_concurrent_writes() {
    use hostpulse::storage::sqlite::SqliteStore;

    let temp_dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("concurrent.db"))
        .await
        .unwrap();
    assert_distinct_ids(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_rows() {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..100 {
                store
                    .store(&create_test_payload("reader-test", 42.0, i as f64 % 100.0))
                    .await
                    .unwrap();
            }
        })
    };

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                for row in store.recent(Some("reader-test"), 1).await.unwrap() {
                    assert_eq!(row.cpu_percent, 42.0);
                    assert_eq!(row.raw_data.hostname, "reader-test");
                    assert_eq!(row.memory_percent, row.raw_data.metrics.memory.percent);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    assert_eq!(store.recent(Some("reader-test"), 1).await.unwrap().len(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cleanup_races_with_ingest() {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                store.store(&create_test_payload("race", 10.0, 10.0)).await.unwrap();
            }
        })
    };

    let cleaner = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut deleted = 0;
            for _ in 0..10 {
                deleted += store.cleanup(30).await.unwrap();
                tokio::task::yield_now().await;
            }
            deleted
        })
    };

    writer.await.unwrap();
    assert_eq!(cleaner.await.unwrap(), 0);
    assert_eq!(store.recent(None, 1).await.unwrap().len(), 50);
}
