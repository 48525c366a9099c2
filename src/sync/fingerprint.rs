//! Content fingerprints for local files.
//!
//! A fingerprint is the MD5 digest of the file rendered as quoted lowercase
//! hex, which is exactly how S3-compatible services report the ETag of a
//! single-part upload, so the two compare as plain strings.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use md5::{Digest, Md5};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::sync::error::{Result, SyncError};

const BUFFER_SIZE: usize = 64 * 1024;

/// Render a raw digest the way the storage service does.
pub fn quote_hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2 + 2);
    out.push('"');
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out.push('"');
    out
}

/// Fingerprint an in-memory buffer.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    quote_hex(&Md5::digest(data))
}

/// Read the whole file and return its fingerprint.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let to_err = |source| SyncError::Fingerprint {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::open(path).map_err(to_err)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(to_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(quote_hex(&hasher.finalize()))
}

/// Fingerprint a file on the blocking pool.
pub async fn fingerprint_file_async(path: PathBuf) -> Result<String> {
    let join_path = path.clone();
    tokio::task::spawn_blocking(move || fingerprint_file(&path))
        .await
        .map_err(|e| SyncError::Fingerprint {
            path: join_path,
            source: std::io::Error::other(e),
        })?
}

/// Convert a base64 MD5 digest (as reported by GCS) into fingerprint form.
pub fn from_base64_md5(encoded: &str) -> Option<String> {
    let raw = BASE64.decode(encoded.trim()).ok()?;
    (raw.len() == 16).then(|| quote_hex(&raw))
}

/// Normalize a service-reported ETag to fingerprint form.
///
/// Some services omit the surrounding quotes; they are added back so a
/// local fingerprint compares equal either way.
pub fn normalize_etag(etag: &str) -> String {
    let inner = etag.trim().trim_matches('"');
    format!("\"{}\"", inner.to_ascii_lowercase())
}
