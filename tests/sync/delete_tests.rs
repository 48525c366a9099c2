// Stale object deletion

use crate::common::*;
use r2sync::config::SyncOptions;
use r2sync::store::MemoryStore;
use std::sync::Arc;

#[tokio::test]
async fn test_stale_key_deleted_only_with_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.insert("prefix/old.txt", b"old");

    let keep = syncer(&store, dir.path(), options("prefix"));
    let plan = keep.plan().await.unwrap();
    assert!(plan.is_empty());
    let summary = keep.run().await.unwrap();
    assert_eq!(summary.deleted, 0);
    assert!(store.deletes().is_empty());

    let prune = syncer(
        &store,
        dir.path(),
        SyncOptions {
            delete: true,
            ..options("prefix")
        },
    );
    assert_eq!(delete_keys(&prune.plan().await.unwrap()), vec!["prefix/old.txt"]);
    let summary = prune.run().await.unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(store.deletes(), vec!["prefix/old.txt".to_string()]);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_delete_stays_inside_prefix() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");

    let store = Arc::new(MemoryStore::new());
    store.insert("site/gone.txt", b"1");
    store.insert("site-archive/keep.txt", b"1");
    store.insert("other/keep.txt", b"1");

    let summary = syncer(
        &store,
        dir.path(),
        SyncOptions {
            delete: true,
            ..options("site")
        },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(
        store.keys(),
        vec!["other/keep.txt", "site-archive/keep.txt", "site/a.txt"]
    );
}

#[tokio::test]
async fn test_uploads_finish_before_deletes_start() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..5 {
        write(dir.path(), &format!("f{}.txt", i), b"data");
    }

    let store = Arc::new(MemoryStore::new().with_delay(std::time::Duration::from_millis(5)));
    for i in 0..5 {
        store.insert(&format!("p/stale{}.txt", i), b"x");
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

    assert_eq!(summary.uploaded, 5);
    assert_eq!(summary.deleted, 5);
    assert_eq!(
        store.keys(),
        vec!["p/f0.txt", "p/f1.txt", "p/f2.txt", "p/f3.txt", "p/f4.txt"]
    );
}
