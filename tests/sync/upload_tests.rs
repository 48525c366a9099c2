// Upload decisions and idempotence

use crate::common::*;
use r2sync::config::SyncOptions;
use r2sync::store::MemoryStore;
use std::sync::Arc;

#[tokio::test]
async fn test_empty_remote_uploads_every_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");
    write(dir.path(), "sub/b.txt", b"bb");
    write(dir.path(), "sub/deep/c.txt", b"ccc");

    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&store, dir.path(), options("site"));

    let plan = syncer.plan().await.unwrap();
    assert_eq!(
        upload_keys(&plan),
        vec!["site/a.txt", "site/sub/b.txt", "site/sub/deep/c.txt"]
    );
    assert!(delete_keys(&plan).is_empty());

    let summary = syncer.run().await.unwrap();
    assert_eq!(summary.uploaded, 3);
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.bytes_uploaded, 6);
    assert_eq!(put_keys(&store), vec!["site/a.txt", "site/sub/b.txt", "site/sub/deep/c.txt"]);
    assert_eq!(store.get("site/sub/deep/c.txt").as_deref(), Some(&b"ccc"[..]));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"alpha");
    write(dir.path(), "nested/b.txt", b"beta");

    let store = Arc::new(MemoryStore::new());
    let opts = SyncOptions {
        delete: true,
        ..options("p")
    };

    let first = syncer(&store, dir.path(), opts.clone()).run().await.unwrap();
    assert_eq!(first.uploaded, 2);

    let second = syncer(&store, dir.path(), opts).run().await.unwrap();
    assert_eq!(second.uploaded, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(store.puts().len(), 2);
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn test_changed_content_same_size_is_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"new!");

    let store = Arc::new(MemoryStore::new());
    store.insert("p/a.txt", b"old!");

    let summary = syncer(&store, dir.path(), options("p")).run().await.unwrap();
    assert_eq!(summary.uploaded, 1);
    assert_eq!(store.get("p/a.txt").as_deref(), Some(&b"new!"[..]));
}

#[tokio::test]
async fn test_empty_prefix_maps_to_bucket_root() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");
    write(dir.path(), "sub/b.txt", b"y");

    let store = Arc::new(MemoryStore::new());
    syncer(&store, dir.path(), options("")).run().await.unwrap();
    assert_eq!(put_keys(&store), vec!["a.txt", "sub/b.txt"]);
}

#[tokio::test]
async fn test_scenario_identical_remote_needs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");

    let store = Arc::new(MemoryStore::new());
    store.insert("prefix/a.txt", b"x");

    let syncer = syncer(
        &store,
        dir.path(),
        SyncOptions {
            delete: true,
            ..options("prefix")
        },
    );
    let plan = syncer.plan().await.unwrap();
    assert!(upload_keys(&plan).is_empty());
    assert!(delete_keys(&plan).is_empty());

    let summary = syncer.run().await.unwrap();
    assert_eq!(summary.uploaded + summary.deleted, 0);
    assert!(store.puts().is_empty());
}

#[tokio::test]
async fn test_dry_run_counts_without_mutating() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");
    write(dir.path(), "b.txt", b"yy");

    let store = Arc::new(MemoryStore::new());
    store.insert("p/stale.txt", b"old");

    let summary = syncer(
        &store,
        dir.path(),
        SyncOptions {
            dry_run: true,
            delete: true,
            ..options("p")
        },
    )
    .run()
    .await
    .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.bytes_uploaded, 3);
    assert!(store.puts().is_empty());
    assert!(store.deletes().is_empty());
    assert_eq!(store.keys(), vec!["p/stale.txt".to_string()]);
}

#[tokio::test]
async fn test_summary_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");

    let store = Arc::new(MemoryStore::new());
    let summary = syncer(&store, dir.path(), options("p")).run().await.unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["uploaded"], 1);
    assert_eq!(json["upload_failed"], 0);
    assert_eq!(json["dry_run"], false);
}
