// Shared fixtures for sync integration tests

use r2sync::config::SyncOptions;
use r2sync::store::MemoryStore;
use r2sync::sync::{SyncDecision, Syncer};
use std::path::Path;
use std::sync::Arc;

/// Write `content` to `root/relative`, creating parent directories.
pub fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Recursive options for `prefix`, everything else default.
pub fn options(prefix: &str) -> SyncOptions {
    SyncOptions {
        prefix: prefix.to_string(),
        recursive: true,
        ..SyncOptions::default()
    }
}

pub fn syncer(store: &Arc<MemoryStore>, root: &Path, options: SyncOptions) -> Syncer {
    Syncer::new(store.clone(), root, options).unwrap()
}

pub fn upload_keys(decisions: &[SyncDecision]) -> Vec<String> {
    keys_where(decisions, SyncDecision::is_upload)
}

pub fn delete_keys(decisions: &[SyncDecision]) -> Vec<String> {
    keys_where(decisions, SyncDecision::is_delete)
}

fn keys_where(decisions: &[SyncDecision], pred: fn(&SyncDecision) -> bool) -> Vec<String> {
    let mut keys: Vec<String> = decisions
        .iter()
        .filter(|d| pred(d))
        .map(|d| d.remote_key().to_string())
        .collect();
    keys.sort();
    keys
}

pub fn put_keys(store: &MemoryStore) -> Vec<String> {
    let mut keys: Vec<String> = store.puts().into_iter().map(|p| p.key).collect();
    keys.sort();
    keys
}
