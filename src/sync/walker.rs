//! Local directory traversal.
//!
//! Excluded directories and, in non-recursive mode, every subdirectory are
//! pruned inside jwalk's `process_read_dir` hook, so their contents are never
//! read. Children are sorted by name and read serially, which keeps the
//! output order stable between runs.

use chrono::{DateTime, Utc};
use jwalk::{Parallelism, WalkDir};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::sync::error::{Result, SyncError};
use crate::sync::exclude::ExcludePatterns;
use crate::sync::path::normalize_path;

/// One regular file found under the sync root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    pub absolute_path: PathBuf,
    /// Path relative to the sync root, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    pub mod_time: Option<DateTime<Utc>>,
}

/// Single-pass walker over a local sync root.
#[derive(Debug, Clone)]
pub struct LocalWalker {
    root: PathBuf,
    recursive: bool,
    excludes: Arc<ExcludePatterns>,
    /// Dangling links and non-regular files left out of the walk.
    skipped: Arc<AtomicUsize>,
    #[cfg(test)]
    fail_after: Option<usize>,
}

impl LocalWalker {
    pub fn new(root: impl Into<PathBuf>, recursive: bool, excludes: ExcludePatterns) -> Self {
        Self {
            root: root.into(),
            recursive,
            excludes: Arc::new(excludes),
            skipped: Arc::new(AtomicUsize::new(0)),
            #[cfg(test)]
            fail_after: None,
        }
    }

    /// Report a walk error in place of the record at `index`.
    #[cfg(test)]
    pub(crate) fn fail_after(mut self, index: usize) -> Self {
        self.fail_after = Some(index);
        self
    }

    /// Entries skipped so far because they were not regular files.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Blocking iterator over eligible files.
    ///
    /// The first error ends the sequence; callers must treat it as fatal.
    pub fn iter(&self) -> impl Iterator<Item = Result<LocalFileRecord>> + '_ {
        let root_excluded = self.excludes.is_excluded(&normalize_path(&self.root));
        if root_excluded {
            debug!(root = %self.root.display(), "sync root itself is excluded");
        }

        let excludes = Arc::clone(&self.excludes);
        let recursive = self.recursive;

        let walk = WalkDir::new(&self.root)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(Parallelism::Serial)
            .process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|child| match child {
                    Ok(entry) => !excludes.is_excluded(&normalize_path(&entry.path())),
                    Err(_) => true,
                });
                if !recursive {
                    for entry in children.iter_mut().flatten() {
                        if entry.file_type().is_dir() {
                            entry.read_children_path = None;
                        }
                    }
                }
            });

        let mut failed = false;
        let records = walk
            .into_iter()
            .take_while(move |_| !root_excluded)
            .filter_map(move |item| {
                if failed {
                    return None;
                }
                let result = match item {
                    Ok(entry) if entry.file_type().is_dir() => return None,
                    Ok(entry) => self.record(&entry.path()).transpose()?,
                    Err(e) => Err(SyncError::LocalWalk {
                        path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()),
                        reason: e.to_string(),
                    }),
                };
                failed = result.is_err();
                Some(result)
            });

        #[cfg(test)]
        let records = inject_fault(records, self.fail_after, self.root.clone());

        records
    }

    /// Run the walk on the blocking pool, streaming records through a
    /// bounded channel. Nothing is sent after the first error.
    pub fn spawn(self, capacity: usize) -> WalkStream {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let root = self.root.clone();
        let skipped = Arc::clone(&self.skipped);
        let handle = tokio::task::spawn_blocking(move || {
            for item in self.iter() {
                let stop = item.is_err();
                if tx.blocking_send(item).is_err() || stop {
                    break;
                }
            }
        });
        WalkStream {
            rx,
            handle: Some(handle),
            root,
            skipped,
        }
    }

    /// Build a record for a regular file, following at most the final link.
    ///
    /// Dangling links, links to directories, FIFOs, sockets and devices are
    /// skipped; reading any of them would fail or block.
    fn record(&self, path: &Path) -> Result<Option<LocalFileRecord>> {
        let walk_error = |e: std::io::Error| SyncError::LocalWalk {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut metadata = std::fs::symlink_metadata(path).map_err(walk_error)?;
        if metadata.file_type().is_symlink() {
            metadata = match std::fs::metadata(path) {
                Ok(target) => target,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping dangling link");
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
            };
        }

        if !metadata.is_file() {
            debug!(path = %path.display(), "skipping entry that is not a regular file");
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let relative = path.strip_prefix(&self.root).map_err(|_| SyncError::LocalWalk {
            path: path.to_path_buf(),
            reason: format!("not under sync root {}", self.root.display()),
        })?;

        Ok(Some(LocalFileRecord {
            absolute_path: path.to_path_buf(),
            relative_path: normalize_path(relative),
            size: metadata.len(),
            mod_time: metadata.modified().ok().map(DateTime::<Utc>::from),
        }))
    }
}

#[cfg(test)]
fn inject_fault<I>(
    records: I,
    fail_after: Option<usize>,
    root: PathBuf,
) -> impl Iterator<Item = Result<LocalFileRecord>>
where
    I: Iterator<Item = Result<LocalFileRecord>>,
{
    let mut failed = false;
    records.enumerate().map_while(move |(index, item)| {
        if failed {
            return None;
        }
        if fail_after == Some(index) {
            failed = true;
            return Some(Err(SyncError::LocalWalk {
                path: root.clone(),
                reason: "injected walk failure".to_string(),
            }));
        }
        Some(item)
    })
}

/// Receiving end of a walk running on the blocking pool.
pub struct WalkStream {
    rx: mpsc::Receiver<Result<LocalFileRecord>>,
    handle: Option<JoinHandle<()>>,
    root: PathBuf,
    skipped: Arc<AtomicUsize>,
}

impl WalkStream {
    /// Entries the walker has skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Next record, or `None` once the walk has completed.
    ///
    /// A walker thread that dies early is reported as a walk error rather
    /// than as a finished walk.
    pub async fn next(&mut self) -> Option<Result<LocalFileRecord>> {
        if let Some(item) = self.rx.recv().await {
            return Some(item);
        }
        let handle = self.handle.take()?;
        match handle.await {
            Ok(()) => None,
            Err(e) => Some(Err(SyncError::LocalWalk {
                path: self.root.clone(),
                reason: format!("walker stopped unexpectedly: {}", e),
            })),
        }
    }
}
