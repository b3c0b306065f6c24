//! Installed-state store: the persisted record of what opm placed on disk
//!
//! The store is the single source of truth for "what is installed". It is a
//! small TOML file (`installed.toml` in the data directory):
//!
//! ```toml
//! version = 1
//!
//! [plugins.poly]
//! name = "poly"
//! version = "1.10.0"
//! library_path = "/home/user/.local/lib/csound/6.0/plugins64/libpoly.so"
//! provenance = "catalog"
//! installed_at = "2026-10-18T09:12:44Z"
//! platform = "linux"
//! checksum = "sha256:9f86d0..."
//! ```
//!
//! # Persistence
//!
//! Every mutation re-reads the file, applies the change and writes it back
//! immediately through [`atomic_write`], so a reader sees either the previous
//! or the new complete state. Within one process a mutex serializes the
//! read-modify-write cycle. Across processes the last rename wins.
//!
//! A file that cannot be parsed is reported as [`OpmError::CorruptState`] and
//! left untouched; only an explicit [`StateStore::reset`] replaces it.

use crate::constants::STATE_FORMAT_VERSION;
use crate::core::OpmError;
use crate::platform::PlatformTag;
use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// How a record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Installed by opm from a catalog binary
    Catalog,
    /// An existing library adopted without a known version
    Manual,
}

/// One installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    #[serde(rename = "name")]
    pub plugin_name: String,
    pub version: Version,
    /// Absolute path of the placed library
    pub library_path: PathBuf,
    pub provenance: Provenance,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformTag>,
    /// `sha256:<hex>` of the placed library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Extra files placed alongside the library
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_files: Vec<PathBuf>,
    /// Artifact location the library was fetched from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl InstalledRecord {
    #[must_use]
    pub const fn is_manual(&self) -> bool {
        matches!(self.provenance, Provenance::Manual)
    }

    /// Whether the recorded library is still on disk.
    #[must_use]
    pub fn library_exists(&self) -> bool {
        self.library_path.is_file()
    }
}

/// Every installed plugin, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledState {
    #[serde(default = "default_format_version")]
    pub version: u32,
    #[serde(default)]
    pub plugins: BTreeMap<String, InstalledRecord>,
}

const fn default_format_version() -> u32 {
    STATE_FORMAT_VERSION
}

impl Default for InstalledState {
    fn default() -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            plugins: BTreeMap::new(),
        }
    }
}

impl InstalledState {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InstalledRecord> {
        self.plugins.get(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &InstalledRecord> {
        self.plugins.values()
    }
}

/// File-backed store of [`InstalledRecord`]s.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole state. A missing or empty file is an empty state.
    ///
    /// # Errors
    ///
    /// [`OpmError::CorruptState`] when the file cannot be read or parsed, or
    /// was written by a newer format.
    pub fn load(&self) -> Result<InstalledState, OpmError> {
        let corrupt = |reason: String| OpmError::CorruptState {
            path: self.path.display().to_string(),
            reason,
        };

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(InstalledState::default());
            }
            Err(e) => return Err(corrupt(e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(InstalledState::default());
        }

        let state: InstalledState =
            toml::from_str(&content).map_err(|e| corrupt(e.message().to_string()))?;
        if state.version > STATE_FORMAT_VERSION {
            return Err(corrupt(format!(
                "format version {} is newer than this opm supports ({STATE_FORMAT_VERSION})",
                state.version
            )));
        }
        Ok(state)
    }

    /// Record for `name`, if installed.
    pub fn get(&self, name: &str) -> Result<Option<InstalledRecord>, OpmError> {
        Ok(self.load()?.plugins.remove(name))
    }

    /// Inserts or wholesale replaces the record for `record.plugin_name`.
    pub fn put(&self, record: InstalledRecord) -> Result<()> {
        self.mutate(|state| {
            debug!("Recording {} {}", record.plugin_name, record.version);
            state.plugins.insert(record.plugin_name.clone(), record);
        })
    }

    /// Deletes the record for `name`. Absent names are a no-op.
    pub fn remove(&self, name: &str) -> Result<Option<InstalledRecord>> {
        let mut removed = None;
        self.mutate(|state| removed = state.plugins.remove(name))?;
        Ok(removed)
    }

    /// Replaces the file with an empty state, discarding whatever it held.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.save(&InstalledState::default())
    }

    fn mutate(&self, change: impl FnOnce(&mut InstalledState)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut state = self.load()?;
        change(&mut state);
        self.save(&state)
    }

    fn save(&self, state: &InstalledState) -> Result<()> {
        let content =
            toml::to_string_pretty(state).context("Failed to serialize installed state")?;
        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write installed state {}", self.path.display()))
    }
}
