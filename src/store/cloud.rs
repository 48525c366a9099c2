use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::TryStreamExt;
use opendal::{services::Gcs, services::S3, Entry, Operator};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::config::{ClientConfig, Scheme};
use crate::store::{ListPage, ObjectStore, RemoteObjectRecord};
use crate::sync::fingerprint::{from_base64_md5, normalize_etag};

/// Objects per listing page, matching the S3 ListObjectsV2 maximum.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Read size while streaming a file into an upload.
const READ_CHUNK: usize = 8 * 1024 * 1024;

/// Files up to this size go out as a single PUT. Larger files use multipart
/// upload, whose ETag is not a plain MD5 and so never matches a local
/// fingerprint.
const MULTIPART_CHUNK: usize = 64 * 1024 * 1024;

/// S3, R2 and GCS storage backed by OpenDAL.
pub struct CloudStore {
    operator: Operator,
    scheme: Scheme,
    bucket: String,
    page_size: usize,
}

impl CloudStore {
    /// Build a store from an explicit client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let operator = match config.scheme {
            Scheme::S3 | Scheme::R2 => Self::s3_operator(config)?,
            Scheme::Gcs => Self::gcs_operator(config)?,
        };

        Ok(Self {
            operator,
            scheme: config.scheme,
            bucket: config.bucket.clone(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    fn s3_operator(config: &ClientConfig) -> Result<Operator> {
        let mut builder = S3::default().bucket(&config.bucket);

        if let Some(region) = &config.region {
            builder = builder.region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint(endpoint);
        }
        // Without explicit keys OpenDAL falls back to the standard AWS chain.
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder.access_key_id(key).secret_access_key(secret);
        }

        let operator = Operator::new(builder)
            .context("Failed to build S3 operator")?
            .finish();
        Ok(operator)
    }

    fn gcs_operator(config: &ClientConfig) -> Result<Operator> {
        let mut builder = Gcs::default().bucket(&config.bucket);

        if let Some(path) = &config.credential_path {
            builder = builder.credential_path(&path.to_string_lossy());
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint(endpoint);
        }

        let operator = Operator::new(builder)
            .context("Failed to build GCS operator")?
            .finish();
        Ok(operator)
    }

    fn record_from_entry(entry: &Entry) -> RemoteObjectRecord {
        let meta = entry.metadata();
        let fingerprint = match meta.etag() {
            Some(etag) if looks_like_md5_etag(etag) => normalize_etag(etag),
            other => meta
                .content_md5()
                .and_then(from_base64_md5)
                .or_else(|| other.map(normalize_etag))
                .unwrap_or_default(),
        };

        RemoteObjectRecord {
            key: entry.path().trim_start_matches('/').to_string(),
            size: meta.content_length(),
            last_modified: meta
                .last_modified()
                .and_then(|ts| parse_timestamp(&ts.to_string())),
            fingerprint,
        }
    }
}

#[async_trait]
impl ObjectStore for CloudStore {
    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage> {
        let path = if prefix.is_empty() { "/" } else { prefix };
        let paginate = self.operator.info().full_capability().list_with_start_after;

        let mut request = self.operator.lister_with(path).recursive(true);
        if let Some(token) = continuation {
            if !paginate {
                bail!("{} backend does not support resuming a listing", self.scheme);
            }
            request = request.start_after(token);
        }
        let mut lister = request
            .await
            .with_context(|| format!("Failed to list {}", self.display_key(prefix)))?;

        let mut page = ListPage::default();
        while let Some(entry) = lister
            .try_next()
            .await
            .with_context(|| format!("Failed to list {}", self.display_key(prefix)))?
        {
            if entry.metadata().mode().is_dir() {
                continue;
            }
            if paginate && page.objects.len() == self.page_size {
                page.is_truncated = true;
                page.next_token = page.objects.last().map(|o| o.key.clone());
                break;
            }
            page.objects.push(Self::record_from_entry(&entry));
        }

        debug!(
            prefix = %prefix,
            objects = page.objects.len(),
            truncated = page.is_truncated,
            "listed page"
        );
        Ok(page)
    }

    async fn put_object(
        &self,
        key: &str,
        local_path: &Path,
        content_length: u64,
        content_type: &str,
    ) -> Result<()> {
        let mut file = tokio::fs::File::open(local_path)
            .await
            .with_context(|| format!("Failed to open {}", local_path.display()))?;

        let mut writer = self
            .operator
            .writer_with(key)
            .content_type(content_type)
            .chunk(MULTIPART_CHUNK)
            .await
            .with_context(|| format!("Failed to start upload to {}", self.display_key(key)))?;

        let mut sent = 0u64;
        let mut buffer = vec![0u8; READ_CHUNK];
        loop {
            let n = file
                .read(&mut buffer)
                .await
                .with_context(|| format!("Failed to read {}", local_path.display()))?;
            if n == 0 {
                break;
            }
            writer
                .write(buffer[..n].to_vec())
                .await
                .with_context(|| format!("Failed to upload to {}", self.display_key(key)))?;
            sent += n as u64;
        }

        if sent != content_length {
            let _ = writer.abort().await;
            bail!(
                "{} changed during upload: expected {} bytes, read {}",
                local_path.display(),
                content_length,
                sent
            );
        }

        writer
            .close()
            .await
            .with_context(|| format!("Failed to finish upload to {}", self.display_key(key)))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.operator
            .delete(key)
            .await
            .with_context(|| format!("Failed to delete {}", self.display_key(key)))?;
        Ok(())
    }

    fn display_key(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key.trim_start_matches('/'))
    }
}

/// A single-part S3 ETag: 32 hex digits, optionally quoted.
fn looks_like_md5_etag(etag: &str) -> bool {
    let inner = etag.trim().trim_matches('"');
    inner.len() == 32 && inner.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse the textual timestamps OpenDAL metadata renders to.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f UTC")
        .ok()
        .map(|naive| naive.and_utc())
}
