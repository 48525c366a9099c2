//! Remote inventory: every object under a prefix, keyed by object key.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::store::{ObjectStore, RemoteObjectRecord};
use crate::sync::error::{Result, SyncError};
use crate::sync::path::{listing_prefix, normalize};

/// Snapshot of the remote side, drained by the diff pass as keys are claimed.
#[derive(Debug, Clone, Default)]
pub struct RemoteInventory {
    objects: HashMap<String, RemoteObjectRecord>,
}

impl RemoteInventory {
    /// List every object under `prefix`, following continuation tokens
    /// until the listing is exhausted.
    ///
    /// Any failing page fails the whole listing; a partial inventory would
    /// turn unlisted objects into spurious deletes.
    pub async fn list(store: &dyn ObjectStore, prefix: &str) -> Result<Self> {
        let prefix = listing_prefix(prefix);
        let mut objects = HashMap::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = store
                .list_page(&prefix, token.as_deref())
                .await
                .map_err(|cause| SyncError::RemoteList {
                    prefix: prefix.clone(),
                    cause,
                })?;
            pages += 1;

            for mut record in page.objects {
                record.key = normalize(&record.key);
                objects.insert(record.key.clone(), record);
            }

            match (page.is_truncated, page.next_token) {
                (true, Some(next)) if token.as_deref() != Some(next.as_str()) => {
                    debug!(page = pages, next = %next, "following listing continuation");
                    token = Some(next);
                }
                (true, _) => {
                    return Err(SyncError::RemoteList {
                        prefix,
                        cause: anyhow::anyhow!(
                            "truncated listing page {} without a usable continuation token",
                            pages
                        ),
                    });
                }
                (false, _) => break,
            }
        }

        info!(
            prefix = %prefix,
            objects = objects.len(),
            pages,
            "remote inventory listed"
        );
        Ok(Self { objects })
    }

    pub fn from_records(records: impl IntoIterator<Item = RemoteObjectRecord>) -> Self {
        Self {
            objects: records
                .into_iter()
                .map(|r| (r.key.clone(), r))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RemoteObjectRecord> {
        self.objects.get(key)
    }

    /// Remove `key` so it is not treated as stale later.
    pub fn claim(&mut self, key: &str) -> Option<RemoteObjectRecord> {
        self.objects.remove(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every key never claimed, in sorted order.
    pub fn into_unclaimed(self) -> Vec<RemoteObjectRecord> {
        let mut rest: Vec<_> = self.objects.into_values().collect();
        rest.sort_by(|a, b| a.key.cmp(&b.key));
        rest
    }
}
