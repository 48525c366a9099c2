// Exclusion, recursion and size-only comparison

use crate::common::*;
use r2sync::config::SyncOptions;
use r2sync::store::MemoryStore;
use r2sync::sync::path::normalize_path;
use r2sync::sync::SyncDecision;
use std::sync::Arc;

#[tokio::test]
async fn test_excluded_directory_is_pruned() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", b"<p>");
    write(dir.path(), "logs/app.txt", b"log");
    write(dir.path(), "logs/nested/deep.txt", b"log");
    write(dir.path(), "src/logs/also.txt", b"log");
    write(dir.path(), "src/main.txt", b"main");

    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(
        &store,
        dir.path(),
        SyncOptions {
            excludes: vec!["logs".into()],
            ..options("p")
        },
    );

    let plan = syncer.plan().await.unwrap();
    assert_eq!(upload_keys(&plan), vec!["p/index.html", "p/src/main.txt"]);
}

#[tokio::test]
async fn test_excluded_remote_key_is_deleted_when_pruning() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "keep.txt", b"k");
    write(dir.path(), "scratch.tmp", b"t");

    let store = Arc::new(MemoryStore::new());
    store.insert("p/keep.txt", b"k");
    store.insert("p/scratch.tmp", b"t");

    let plan = syncer(
        &store,
        dir.path(),
        SyncOptions {
            delete: true,
            excludes: vec!["*.tmp".into()],
            ..options("p")
        },
    )
    .plan()
    .await
    .unwrap();

    assert!(upload_keys(&plan).is_empty());
    assert_eq!(delete_keys(&plan), vec!["p/scratch.tmp"]);
}

#[tokio::test]
async fn test_backslash_exclude_pattern_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "build/out/a.bin", b"a");
    write(dir.path(), "build/keep.txt", b"k");

    let pattern = normalize_path(&dir.path().join("build").join("out")).replace('/', "\\");

    let store = Arc::new(MemoryStore::new());
    let plan = syncer(
        &store,
        dir.path(),
        SyncOptions {
            excludes: vec![pattern],
            ..options("p")
        },
    )
    .plan()
    .await
    .unwrap();

    assert_eq!(upload_keys(&plan), vec!["p/build/keep.txt"]);
}

#[tokio::test]
async fn test_relative_multi_segment_pattern_keeps_remote_copy() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sub/b.txt", b"same");

    let store = Arc::new(MemoryStore::new());
    store.insert("p/sub/b.txt", b"same");

    let plan = syncer(
        &store,
        dir.path(),
        SyncOptions {
            delete: true,
            excludes: vec!["sub/*.txt".into()],
            ..options("p")
        },
    )
    .plan()
    .await
    .unwrap();

    assert!(upload_keys(&plan).is_empty());
    assert!(delete_keys(&plan).is_empty());
}

#[tokio::test]
async fn test_non_recursive_only_top_level() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");
    write(dir.path(), "sub/b.txt", b"bb");

    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(
        &store,
        dir.path(),
        SyncOptions {
            recursive: false,
            ..options("")
        },
    );

    let plan = syncer.plan().await.unwrap();
    assert_eq!(
        plan,
        vec![SyncDecision::Upload {
            local_path: dir.path().join("a.txt"),
            remote_key: "a.txt".into(),
            size: 1,
        }]
    );

    syncer.run().await.unwrap();
    assert_eq!(put_keys(&store), vec!["a.txt"]);
}

#[tokio::test]
async fn test_non_recursive_never_deletes_nested_keys_it_did_not_see() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"x");
    write(dir.path(), "sub/b.txt", b"bb");

    let store = Arc::new(MemoryStore::new());
    store.insert("p/a.txt", b"x");

    let plan = syncer(
        &store,
        dir.path(),
        SyncOptions {
            recursive: false,
            ..options("p")
        },
    )
    .plan()
    .await
    .unwrap();
    assert!(plan.iter().all(|d| !d.remote_key().contains("sub/")));
}

#[tokio::test]
async fn test_size_only_skips_same_size_changes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"aaaa");

    let store = Arc::new(MemoryStore::new());
    store.insert("p/a.txt", b"bbbb");

    let size_only = syncer(
        &store,
        dir.path(),
        SyncOptions {
            size_only: true,
            ..options("p")
        },
    );
    let summary = size_only.run().await.unwrap();
    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.skipped, 1);
    assert!(store.puts().is_empty());

    let full = syncer(&store, dir.path(), options("p"));
    assert_eq!(upload_keys(&full.plan().await.unwrap()), vec!["p/a.txt"]);
}

#[tokio::test]
async fn test_size_only_still_uploads_size_changes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"longer content");

    let store = Arc::new(MemoryStore::new());
    store.insert("p/a.txt", b"short");

    let summary = syncer(
        &store,
        dir.path(),
        SyncOptions {
            size_only: true,
            ..options("p")
        },
    )
    .run()
    .await
    .unwrap();
    assert_eq!(summary.uploaded, 1);
}
