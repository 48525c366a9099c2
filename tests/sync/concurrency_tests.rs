// Admission gate limits

use crate::common::*;
use r2sync::config::SyncOptions;
use r2sync::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

async fn peak_for(concurrency: usize, files: usize) -> usize {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..files {
        write(dir.path(), &format!("f{:03}.txt", i), b"payload");
    }

    let store = Arc::new(MemoryStore::new().with_delay(Duration::from_millis(10)));
    let summary = syncer(
        &store,
        dir.path(),
        SyncOptions {
            concurrency,
            ..options("p")
        },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.uploaded, files);
    store.peak_concurrency()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_uploads_respect_concurrency_limit() {
    let peak = peak_for(3, 20).await;
    assert!(peak <= 3, "peak {} exceeded limit", peak);
    assert!(peak >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_of_one_serializes_uploads() {
    assert_eq!(peak_for(1, 8).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deletes_respect_concurrency_limit() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new().with_delay(Duration::from_millis(10)));
    for i in 0..12 {
        store.insert(&format!("p/old{:02}.txt", i), b"x");
    }

    let summary = syncer(
        &store,
        dir.path(),
        SyncOptions {
            delete: true,
            concurrency: 2,
            ..options("p")
        },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.deleted, 12);
    assert!(store.peak_concurrency() <= 2);
    assert!(store.keys().is_empty());
}
