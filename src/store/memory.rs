use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::store::{ListPage, ObjectStore, RemoteObjectRecord};
use crate::sync::fingerprint::fingerprint_bytes;

/// A recorded `put_object` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutCall {
    pub key: String,
    pub content_length: u64,
    pub content_type: String,
}

#[derive(Default)]
struct Faults {
    put_keys: HashSet<String>,
    delete_keys: HashSet<String>,
    list_page: Option<usize>,
}

/// An in-memory implementation of `ObjectStore`, intended primarily for testing.
///
/// Objects are kept in key order, like a real bucket listing. Every mutation
/// call is recorded, faults can be injected per key, and the peak number of
/// concurrently running put/delete calls is tracked.
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (RemoteObjectRecord, Vec<u8>)>>,
    page_size: usize,
    delay: Option<Duration>,
    puts: Mutex<Vec<PutCall>>,
    deletes: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
    faults: Mutex<Faults>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: 1000,
            delay: None,
            puts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            faults: Mutex::new(Faults::default()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleep this long inside every put/delete call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Store `data` under `key` with a fingerprint computed from it.
    pub fn insert(&self, key: &str, data: &[u8]) {
        let record = RemoteObjectRecord {
            key: key.to_string(),
            size: data.len() as u64,
            last_modified: Some(Utc::now()),
            fingerprint: fingerprint_bytes(data),
        };
        self.insert_record(record, data.to_vec());
    }

    /// Store a record verbatim, e.g. with a fingerprint that does not match.
    pub fn insert_record(&self, record: RemoteObjectRecord, data: Vec<u8>) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(record.key.clone(), (record, data));
    }

    pub fn fail_put(&self, key: &str) {
        self.faults.lock().unwrap().put_keys.insert(key.to_string());
    }

    pub fn fail_delete(&self, key: &str) {
        self.faults.lock().unwrap().delete_keys.insert(key.to_string());
    }

    /// Fail the listing call for the given zero-based page.
    pub fn fail_list_on_page(&self, page: usize) {
        self.faults.lock().unwrap().list_page = Some(page);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, data)| data.clone())
    }

    pub fn puts(&self) -> Vec<PutCall> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    /// Number of `list_page` calls served, including failed ones.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Highest number of put/delete calls observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> ActiveGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = ActiveGuard(&self.active);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.faults.lock().unwrap().list_page == Some(call);
        if fail {
            bail!("injected listing failure on page {}", call);
        }

        let objects = self.objects.lock().unwrap();
        let mut matching = objects
            .values()
            .map(|(record, _)| record)
            .filter(|record| record.key.starts_with(prefix))
            .filter(|record| continuation.map_or(true, |token| record.key.as_str() > token));

        let page: Vec<RemoteObjectRecord> = matching.by_ref().take(self.page_size).cloned().collect();
        let is_truncated = matching.next().is_some();
        let next_token = if is_truncated {
            page.last().map(|record| record.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            is_truncated,
            next_token,
        })
    }

    async fn put_object(
        &self,
        key: &str,
        local_path: &Path,
        content_length: u64,
        content_type: &str,
    ) -> Result<()> {
        let _guard = self.enter().await;
        self.puts.lock().unwrap().push(PutCall {
            key: key.to_string(),
            content_length,
            content_type: content_type.to_string(),
        });

        let fail = self.faults.lock().unwrap().put_keys.contains(key);
        if fail {
            return Err(anyhow!("injected put failure for {}", key));
        }

        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("Failed to read {}", local_path.display()))?;
        self.insert(key, &data);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let _guard = self.enter().await;
        self.deletes.lock().unwrap().push(key.to_string());

        let fail = self.faults.lock().unwrap().delete_keys.contains(key);
        if fail {
            return Err(anyhow!("injected delete failure for {}", key));
        }

        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn display_key(&self, key: &str) -> String {
        format!("mem://{}", key)
    }
}
