use std::fmt;
use std::str::FromStr;

use crate::sync::error::{Result, SyncError};
use crate::sync::path::normalize;

/// Storage endpoint family selected by the target URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    S3,
    R2,
    Gcs,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::S3 => "s3",
            Scheme::R2 => "r2",
            Scheme::Gcs => "gs",
        }
    }

    /// Region used when nothing else provides one.
    pub fn default_region(&self) -> Option<&'static str> {
        match self {
            Scheme::S3 => Some("us-east-1"),
            Scheme::R2 => Some("auto"),
            Scheme::Gcs => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Scheme::S3),
            "r2" => Ok(Scheme::R2),
            "gs" | "gcs" => Ok(Scheme::Gcs),
            other => Err(SyncError::config(format!(
                "unsupported scheme '{}' (expected r2, s3 or gs)",
                other
            ))),
        }
    }
}

/// Parsed `scheme://bucket/prefix` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    pub bucket: String,
    /// Key prefix without a leading slash; may be empty.
    pub prefix: String,
}

impl Target {
    pub fn parse(url: &str) -> Result<Self> {
        let url = normalize(url.trim());
        let (scheme, rest) = url.split_once("://").ok_or_else(|| {
            SyncError::config(format!(
                "invalid target '{}': expected scheme://bucket/prefix",
                url
            ))
        })?;

        let scheme: Scheme = scheme.parse()?;
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_start_matches('/')),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(SyncError::config(format!(
                "invalid target '{}': missing bucket name",
                url
            )));
        }

        Ok(Self {
            scheme,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.prefix)
    }
}
