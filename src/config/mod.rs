//! Client and run configuration.
//!
//! Storage credentials are resolved once, up front, into an explicit
//! [`ClientConfig`] value: CLI overrides win over environment variables,
//! which win over the config file, which wins over per-scheme defaults.

pub mod file;
pub mod target;

pub use file::{FileConfig, ProviderSection};
pub use target::{Scheme, Target};

use std::path::PathBuf;

use crate::sync::error::{Result, SyncError};

/// Default number of concurrent upload/delete operations.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Values given on the command line that take precedence over everything.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub region: Option<String>,
}

/// Fully resolved storage client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub scheme: Scheme,
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Service account JSON for GCS.
    pub credential_path: Option<PathBuf>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("scheme", &self.scheme)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<set>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<set>"))
            .field("credential_path", &self.credential_path)
            .finish()
    }
}

impl ClientConfig {
    /// Resolve against the real process environment.
    pub fn from_env(
        target: &Target,
        file: &FileConfig,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        Self::resolve(target, file, overrides, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve<F>(
        target: &Target,
        file: &FileConfig,
        overrides: &ConfigOverrides,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = file.section(target.scheme);
        let env_any = |names: &[&str]| names.iter().find_map(|name| env(*name).filter(|v| !v.is_empty()));

        let region = overrides
            .region
            .clone()
            .or_else(|| env_any(&["AWS_REGION", "AWS_DEFAULT_REGION"]))
            .or_else(|| section.region.clone())
            .or_else(|| target.scheme.default_region().map(str::to_string));

        let account_id = env_any(&["R2_ACCOUNT_ID", "CLOUDFLARE_ACCOUNT_ID"])
            .or_else(|| section.account_id.clone());

        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| env_any(&["AWS_ENDPOINT_URL"]))
            .or_else(|| section.endpoint.clone())
            .or_else(|| match target.scheme {
                Scheme::R2 => account_id
                    .as_ref()
                    .map(|id| format!("https://{}.r2.cloudflarestorage.com", id)),
                _ => None,
            });

        if target.scheme == Scheme::R2 && endpoint.is_none() {
            return Err(SyncError::config(
                "r2 targets need an account id (R2_ACCOUNT_ID or [r2].account_id) or an explicit endpoint",
            ));
        }

        Ok(Self {
            scheme: target.scheme,
            bucket: target.bucket.clone(),
            region,
            endpoint,
            access_key_id: env_any(&["AWS_ACCESS_KEY_ID"])
                .or_else(|| section.access_key_id.clone()),
            secret_access_key: env_any(&["AWS_SECRET_ACCESS_KEY"])
                .or_else(|| section.secret_access_key.clone()),
            credential_path: env_any(&["GOOGLE_APPLICATION_CREDENTIALS"])
                .map(PathBuf::from)
                .or_else(|| section.credential_path.clone()),
        })
    }
}

/// Options for a single sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Remote key prefix the local root maps onto.
    pub prefix: String,
    /// Delete remote objects with no local counterpart.
    pub delete: bool,
    /// Log and count operations without calling put/delete.
    pub dry_run: bool,
    /// Descend into subdirectories.
    pub recursive: bool,
    pub concurrency: usize,
    /// Compare sizes only, never fingerprints.
    pub size_only: bool,
    pub excludes: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delete: false,
            dry_run: false,
            recursive: false,
            concurrency: DEFAULT_CONCURRENCY,
            size_only: false,
            excludes: Vec::new(),
        }
    }
}

impl SyncOptions {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SyncError::config("concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Convert a user supplied concurrency value, rejecting zero and negatives.
pub fn parse_concurrency(value: i64) -> Result<usize> {
    if value < 1 {
        return Err(SyncError::config(format!(
            "concurrency must be at least 1, got {}",
            value
        )));
    }
    usize::try_from(value)
        .map_err(|_| SyncError::config(format!("concurrency {} is too large", value)))
}
