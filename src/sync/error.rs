//! Error taxonomy for sync runs.
//!
//! `Config`, `RemoteList` and `LocalWalk` abort a run. `Fingerprint` and
//! `Transport` are scoped to a single file or object and are logged by the
//! orchestrator instead of being propagated.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for the sync core.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to list remote objects under '{prefix}': {cause:#}")]
    RemoteList { prefix: String, cause: anyhow::Error },

    #[error("failed to walk local tree at {}: {reason}", .path.display())]
    LocalWalk { path: PathBuf, reason: String },

    #[error("failed to fingerprint {}: {source}", .path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer failed for {key}: {cause:#}")]
    Transport { key: String, cause: anyhow::Error },
}

impl SyncError {
    pub fn config(msg: impl Into<String>) -> Self {
        SyncError::Config(msg.into())
    }

    /// True for errors that end the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_) | SyncError::RemoteList { .. } | SyncError::LocalWalk { .. }
        )
    }
}
