//! Bounded task execution.
//!
//! A fixed-size semaphore is the admission gate: `submit` waits for a permit
//! before spawning, so the submitter is held back while the gate is full.
//! Failures and panics are recorded per task and never cancel siblings;
//! `join` returns only after every submitted task has finished.

use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::sync::error::{Result, SyncError};

/// Outcome counts for one batch of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of the byte counts returned by successful tasks.
    pub bytes: u64,
    /// Keys of failed tasks, sorted.
    pub failed_keys: Vec<String>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

type TaskResult = (String, std::thread::Result<Result<u64>>);

/// Pool of tasks admitted through a fixed number of permits.
pub struct TaskPool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<TaskResult>,
    submitted: usize,
}

impl TaskPool {
    /// Create a pool running at most `concurrency` tasks at once.
    pub fn new(name: &'static str, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(SyncError::config("concurrency must be at least 1"));
        }
        Ok(Self {
            name,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            tasks: JoinSet::new(),
            submitted: 0,
        })
    }

    /// Wait for a free slot, then start `task` in the background.
    ///
    /// `task` resolves to the number of bytes it moved.
    pub async fn submit<F>(&mut self, key: impl Into<String>, task: F)
    where
        F: Future<Output = Result<u64>> + Send + 'static,
    {
        let key = key.into();
        // The semaphore is never closed, so acquiring cannot fail.
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok();
        self.submitted += 1;

        self.tasks.spawn(async move {
            let _permit = permit;
            let result = AssertUnwindSafe(task).catch_unwind().await;
            (key, result)
        });
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Wait for every submitted task and tally the outcomes.
    pub async fn join(mut self) -> BatchReport {
        let mut report = BatchReport::default();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((_, Ok(Ok(bytes)))) => {
                    report.succeeded += 1;
                    report.bytes += bytes;
                }
                Ok((key, Ok(Err(e)))) => {
                    warn!(pool = self.name, key = %key, error = %e, "task failed");
                    report.failed += 1;
                    report.failed_keys.push(key);
                }
                Ok((key, Err(_))) => {
                    error!(pool = self.name, key = %key, "task panicked");
                    report.failed += 1;
                    report.failed_keys.push(key);
                }
                Err(e) => {
                    error!(pool = self.name, error = %e, "task could not be joined");
                    report.failed += 1;
                }
            }
        }

        report.failed_keys.sort();
        report
    }
}
