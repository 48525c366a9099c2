//! Per-file sync decisions.
//!
//! Each local file is compared with the remote inventory and its key is
//! claimed whatever the outcome. Whatever is still unclaimed once the walk
//! has finished is stale.

use std::path::PathBuf;
use tracing::debug;

use crate::sync::error::Result;
use crate::sync::fingerprint::fingerprint_file_async;
use crate::sync::inventory::RemoteInventory;
use crate::sync::path::join_key;
use crate::sync::walker::LocalFileRecord;

/// Why a file needs no transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Sizes match and size-only mode is on.
    SizeMatch,
    /// Sizes and fingerprints match.
    FingerprintMatch,
}

/// What to do with one local file or remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    Upload {
        local_path: PathBuf,
        remote_key: String,
        size: u64,
    },
    Skip {
        remote_key: String,
        reason: SkipReason,
    },
    Delete {
        remote_key: String,
    },
}

impl SyncDecision {
    pub fn remote_key(&self) -> &str {
        match self {
            SyncDecision::Upload { remote_key, .. } => remote_key,
            SyncDecision::Skip { remote_key, .. } => remote_key,
            SyncDecision::Delete { remote_key } => remote_key,
        }
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, SyncDecision::Upload { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, SyncDecision::Delete { .. })
    }
}

/// Classifies local files against a remote inventory it owns.
pub struct DiffEngine {
    inventory: RemoteInventory,
    prefix: String,
    size_only: bool,
}

impl DiffEngine {
    pub fn new(inventory: RemoteInventory, prefix: impl Into<String>, size_only: bool) -> Self {
        Self {
            inventory,
            prefix: prefix.into(),
            size_only,
        }
    }

    /// Decide whether `local` must be uploaded.
    ///
    /// The matching remote key is claimed before any fingerprinting, so a
    /// file that fails to hash is still never reported as stale. A
    /// fingerprint failure is returned as an error for this file only.
    pub async fn classify(&mut self, local: &LocalFileRecord) -> Result<SyncDecision> {
        let remote_key = join_key(&self.prefix, &local.relative_path);
        let upload = |remote_key: String| SyncDecision::Upload {
            local_path: local.absolute_path.clone(),
            remote_key,
            size: local.size,
        };

        let Some(remote) = self.inventory.claim(&remote_key) else {
            debug!(key = %remote_key, "not present remotely");
            return Ok(upload(remote_key));
        };

        if remote.size != local.size {
            debug!(key = %remote_key, local = local.size, remote = remote.size, "size differs");
            return Ok(upload(remote_key));
        }

        if self.size_only {
            return Ok(SyncDecision::Skip {
                remote_key,
                reason: SkipReason::SizeMatch,
            });
        }

        let fingerprint = fingerprint_file_async(local.absolute_path.clone()).await?;
        if fingerprint == remote.fingerprint {
            Ok(SyncDecision::Skip {
                remote_key,
                reason: SkipReason::FingerprintMatch,
            })
        } else {
            debug!(
                key = %remote_key,
                local = %fingerprint,
                remote = %remote.fingerprint,
                "fingerprint differs"
            );
            Ok(upload(remote_key))
        }
    }

    /// Remote objects that no local file claimed.
    pub fn remaining(&self) -> usize {
        self.inventory.len()
    }

    /// Turn every unclaimed remote key into a delete, if deleting is enabled.
    ///
    /// Must only be called after the local walk has completed.
    pub fn finish(self, delete: bool) -> Vec<SyncDecision> {
        if !delete {
            return Vec::new();
        }
        self.inventory
            .into_unclaimed()
            .into_iter()
            .map(|record| SyncDecision::Delete {
                remote_key: record.key,
            })
            .collect()
    }
}
