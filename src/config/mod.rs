//! User configuration for opm
//!
//! Settings live in a small TOML file:
//! - Unix/macOS: `~/.opm/config.toml`
//! - Windows: `%LOCALAPPDATA%\opm\config.toml`
//!
//! `--config` or `OPM_CONFIG` point at another file. Every key is optional:
//!
//! ```toml
//! catalog_url = "https://example.org/catalog.json"
//! plugin_dir = "~/csound/plugins64"
//! host_binary = "/opt/csound/bin/csound"
//! max_parallel = 4
//! download_timeout_secs = 60
//! download_retries = 3
//! ```
//!
//! Command-line flags and `OPM_*` environment variables take precedence over
//! the file; the file takes precedence over built-in defaults.

use crate::constants::{
    DEFAULT_CATALOG_URL, DEFAULT_DOWNLOAD_RETRIES, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_HOST_BINARY,
    DEFAULT_MAX_PARALLEL, MAX_PARALLEL_LIMIT,
};
use crate::utils::fs::expand_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_url: Option<String>,

    /// Overrides the platform default plugin directory. `~` and `$VAR` expand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_binary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_retries: Option<usize>,
}

impl OpmConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A file that does not exist yields the default configuration.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Platform location of the config file.
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::default_dir()?.join("config.toml"))
    }

    /// Directory holding the config file, also the default data directory.
    pub fn default_dir() -> Result<PathBuf> {
        let dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("opm")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".opm")
        };
        Ok(dir)
    }

    #[must_use]
    pub fn catalog_url(&self) -> &str {
        self.catalog_url.as_deref().unwrap_or(DEFAULT_CATALOG_URL)
    }

    #[must_use]
    pub fn host_binary(&self) -> &str {
        self.host_binary.as_deref().unwrap_or(DEFAULT_HOST_BINARY)
    }

    /// Expanded `plugin_dir`, if configured.
    pub fn plugin_dir(&self) -> Result<Option<PathBuf>> {
        self.plugin_dir.as_deref().map(expand_path).transpose()
    }

    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.max_parallel.unwrap_or(DEFAULT_MAX_PARALLEL).clamp(1, MAX_PARALLEL_LIMIT)
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        self.download_timeout_secs.map_or(DEFAULT_DOWNLOAD_TIMEOUT, Duration::from_secs)
    }

    #[must_use]
    pub fn download_retries(&self) -> usize {
        self.download_retries.unwrap_or(DEFAULT_DOWNLOAD_RETRIES)
    }
}
