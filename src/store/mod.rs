//! Object storage capability surface used by the sync core.
//!
//! The core only needs paginated listing, single-object put and
//! single-object delete. Credentials and endpoints are resolved ahead of
//! time into a [`ClientConfig`](crate::config::ClientConfig) and handed to a
//! backend constructor, never read from ambient process state here.

pub mod memory;
pub mod cloud;

pub use memory::MemoryStore;
pub use cloud::CloudStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// One object as reported by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRecord {
    /// Key relative to the bucket root, `/`-separated.
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Content identity token as the service returns it, quotes included.
    pub fingerprint: String,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<RemoteObjectRecord>,
    pub is_truncated: bool,
    /// Opaque token to pass back for the next page.
    pub next_token: Option<String>,
}

/// Storage backend trait consumed by the sync core.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects under `prefix`, resuming after `continuation`.
    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage>;

    /// Upload the file at `local_path` as `key`.
    async fn put_object(
        &self,
        key: &str,
        local_path: &Path,
        content_length: u64,
        content_type: &str,
    ) -> Result<()>;

    /// Delete a single object.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Human readable location of `key`, e.g. `r2://bucket/key`.
    fn display_key(&self, key: &str) -> String {
        key.to_string()
    }
}
