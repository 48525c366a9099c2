//! Sync engine for one-way directory to bucket synchronization.
//!
//! A run moves through fixed phases: the remote prefix is listed in full,
//! the local tree is walked and diffed file by file while uploads start in
//! the background, and once the walk has completed the unclaimed remote keys
//! are deleted if requested. Listing and walk failures abort the run; failed
//! uploads and deletes are only counted.

use humansize::{format_size, BINARY};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::SyncOptions;
use crate::store::ObjectStore;
use crate::sync::diff::{DiffEngine, SyncDecision};
use crate::sync::error::{Result, SyncError};
use crate::sync::exclude::ExcludePatterns;
use crate::sync::executor::{BatchReport, TaskPool};
use crate::sync::inventory::RemoteInventory;
use crate::sync::path::{listing_prefix, normalize, normalize_path};
use crate::sync::walker::{LocalWalker, WalkStream};

/// Records buffered between the walker thread and the diff loop.
const WALK_BUFFER: usize = 256;

/// Current sync phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    ListingRemote,
    Walking,
    Uploading,
    Deleting,
    Done,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::ListingRemote => "listing-remote",
            SyncPhase::Walking => "walking",
            SyncPhase::Uploading => "uploading",
            SyncPhase::Deleting => "deleting",
            SyncPhase::Done => "done",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed run.
///
/// In dry-run mode the counts describe what would have happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub uploaded: usize,
    pub upload_failed: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub skipped: usize,
    pub fingerprint_failed: usize,
    /// Dangling links and non-regular files left out of the walk.
    pub entries_skipped: usize,
    pub bytes_uploaded: u64,
    pub dry_run: bool,
    pub duration_ms: u64,
    /// Keys whose upload or delete failed, sorted.
    pub failed_keys: Vec<String>,
}

impl SyncSummary {
    /// Files or objects that could not be processed.
    pub fn failures(&self) -> usize {
        self.upload_failed + self.delete_failed + self.fingerprint_failed
    }

    pub fn is_clean(&self) -> bool {
        self.failures() == 0
    }

    fn record_uploads(&mut self, report: BatchReport) {
        self.uploaded = report.succeeded;
        self.upload_failed = report.failed;
        self.bytes_uploaded = report.bytes;
        self.failed_keys.extend(report.failed_keys);
    }

    fn record_deletes(&mut self, report: BatchReport) {
        self.deleted = report.succeeded;
        self.delete_failed = report.failed;
        self.failed_keys.extend(report.failed_keys);
        self.failed_keys.sort();
    }
}

/// Orchestrates a sync from a local directory to a remote prefix.
pub struct Syncer {
    store: Arc<dyn ObjectStore>,
    source: PathBuf,
    options: SyncOptions,
    #[cfg(test)]
    walk_fault: Option<usize>,
}

impl Syncer {
    /// Create a syncer. Options are validated here, before any I/O.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        source: impl AsRef<Path>,
        mut options: SyncOptions,
    ) -> Result<Self> {
        options.validate()?;
        options.prefix = normalize(&options.prefix);
        Ok(Self {
            store,
            source: PathBuf::from(normalize_path(source.as_ref())),
            options,
            #[cfg(test)]
            walk_fault: None,
        })
    }

    /// Compute every decision a run would make without calling put or delete.
    ///
    /// Files that fail to fingerprint are left out.
    pub async fn plan(&self) -> Result<Vec<SyncDecision>> {
        let (mut diff, mut walk) = self.start().await?;
        let mut decisions = Vec::new();

        while let Some(item) = walk.next().await {
            let local = item?;
            match diff.classify(&local).await {
                Ok(decision) => decisions.push(decision),
                Err(e) => warn!(path = %local.absolute_path.display(), error = %e, "cannot fingerprint file"),
            }
        }

        decisions.extend(diff.finish(self.options.delete));
        Ok(decisions)
    }

    /// Perform the sync.
    ///
    /// Returns an error only for fatal conditions; per-file failures are
    /// reported in the summary.
    pub async fn run(&self) -> Result<SyncSummary> {
        let started = Instant::now();
        let mut summary = SyncSummary {
            dry_run: self.options.dry_run,
            ..SyncSummary::default()
        };

        let (mut diff, mut walk) = self.start().await?;
        let mut uploads = TaskPool::new("upload", self.options.concurrency)?;

        let walked = loop {
            let local = match walk.next().await {
                None => break Ok(()),
                Some(Err(e)) => break Err(e),
                Some(Ok(local)) => local,
            };

            match diff.classify(&local).await {
                Ok(SyncDecision::Upload {
                    local_path,
                    remote_key,
                    size,
                }) => {
                    if uploads.submitted() == 0 {
                        self.enter(SyncPhase::Uploading);
                    }
                    let task = self.upload_task(local_path, remote_key.clone(), size);
                    uploads.submit(remote_key, task).await;
                }
                Ok(decision) => {
                    debug!(key = decision.remote_key(), "up to date");
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(path = %local.absolute_path.display(), error = %e, "cannot fingerprint file, skipping");
                    summary.fingerprint_failed += 1;
                }
            }
        };

        // In-flight uploads always run to completion, even after a walk error.
        let submitted = uploads.submitted();
        summary.entries_skipped = walk.skipped();
        debug!(submitted, "waiting for in-flight uploads");
        summary.record_uploads(uploads.join().await);
        if let Err(e) = walked {
            warn!(
                uploaded = summary.uploaded,
                "local walk failed, no remote objects will be deleted"
            );
            return Err(e);
        }
        info!("{} files uploaded.", submitted);

        let deletes = diff.finish(self.options.delete);
        if self.options.delete {
            self.enter(SyncPhase::Deleting);
            let mut pool = TaskPool::new("delete", self.options.concurrency)?;
            for decision in deletes {
                let key = decision.remote_key().to_string();
                let task = self.delete_task(key.clone());
                pool.submit(key, task).await;
            }
            let submitted = pool.submitted();
            summary.record_deletes(pool.join().await);
            info!("{} files deleted.", submitted);
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        self.enter(SyncPhase::Done);
        info!(
            uploaded = summary.uploaded,
            upload_failed = summary.upload_failed,
            deleted = summary.deleted,
            delete_failed = summary.delete_failed,
            skipped = summary.skipped,
            fingerprint_failed = summary.fingerprint_failed,
            entries_skipped = summary.entries_skipped,
            bytes = %format_size(summary.bytes_uploaded, BINARY),
            dry_run = summary.dry_run,
            "sync complete"
        );
        Ok(summary)
    }

    /// Check the source, list the remote side and start the local walk.
    async fn start(&self) -> Result<(DiffEngine, WalkStream)> {
        self.check_source().await?;

        self.enter(SyncPhase::ListingRemote);
        let inventory = RemoteInventory::list(self.store.as_ref(), &self.options.prefix).await?;

        self.enter(SyncPhase::Walking);
        let diff = DiffEngine::new(inventory, self.options.prefix.clone(), self.options.size_only);
        let excludes = ExcludePatterns::from_patterns(&self.options.excludes);
        let walker = LocalWalker::new(self.source.clone(), self.options.recursive, excludes);
        #[cfg(test)]
        let walker = match self.walk_fault {
            Some(index) => walker.fail_after(index),
            None => walker,
        };
        Ok((diff, walker.spawn(WALK_BUFFER)))
    }

    async fn check_source(&self) -> Result<()> {
        match tokio::fs::metadata(&self.source).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(SyncError::config(format!(
                "source {} is not a directory",
                self.source.display()
            ))),
            Err(e) => Err(SyncError::config(format!(
                "cannot read source {}: {}",
                self.source.display(),
                e
            ))),
        }
    }

    fn enter(&self, phase: SyncPhase) {
        info!(
            phase = %phase,
            source = %self.source.display(),
            target = %self.store.display_key(&listing_prefix(&self.options.prefix)),
            dry_run = self.options.dry_run,
            "entering phase"
        );
    }

    fn upload_task(
        &self,
        local_path: PathBuf,
        key: String,
        size: u64,
    ) -> impl Future<Output = Result<u64>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let dry_run = self.options.dry_run;

        async move {
            let target = store.display_key(&key);
            if dry_run {
                info!("(dryrun) upload: {} -> {}", local_path.display(), target);
                return Ok(size);
            }

            let content_type = mime_guess::from_path(&local_path)
                .first_or_octet_stream()
                .to_string();
            let started = Instant::now();
            store
                .put_object(&key, &local_path, size, &content_type)
                .await
                .map_err(|cause| SyncError::Transport {
                    key: key.clone(),
                    cause,
                })?;

            info!(
                "upload: {} -> {}, size: {}, average speed: {}/s",
                local_path.display(),
                target,
                format_size(size, BINARY),
                format_size(bytes_per_second(size, started.elapsed()), BINARY)
            );
            Ok(size)
        }
    }

    fn delete_task(&self, key: String) -> impl Future<Output = Result<u64>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let dry_run = self.options.dry_run;

        async move {
            let target = store.display_key(&key);
            if dry_run {
                info!("(dryrun) delete: {}", target);
                return Ok(0);
            }

            store
                .delete_object(&key)
                .await
                .map_err(|cause| SyncError::Transport {
                    key: key.clone(),
                    cause,
                })?;
            info!("delete: {}", target);
            Ok(0)
        }
    }
}

fn bytes_per_second(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= f64::EPSILON {
        return bytes;
    }
    (bytes as f64 / secs) as u64
}
