// Optional TOML config file with one table per storage family:
//
//   [r2]
//   account_id = "..."
//   access_key_id = "..."
//   secret_access_key = "..."
//
//   [s3]
//   region = "eu-west-1"
//
//   [gcs]
//   credential_path = "/etc/r2sync/sa.json"

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::target::Scheme;
use crate::sync::error::{Result, SyncError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub account_id: Option<String>,
    pub credential_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub s3: ProviderSection,
    #[serde(default)]
    pub r2: ProviderSection,
    #[serde(default)]
    pub gcs: ProviderSection,
}

impl FileConfig {
    /// `<config dir>/r2sync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("r2sync").join("config.toml"))
    }

    /// Load the explicit file, or the default one if it exists.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file just yields an empty config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::config(format!("invalid config file: {}", e)))
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn section(&self, scheme: Scheme) -> &ProviderSection {
        match scheme {
            Scheme::S3 => &self.s3,
            Scheme::R2 => &self.r2,
            Scheme::Gcs => &self.gcs,
        }
    }
}
