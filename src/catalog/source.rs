//! Catalog retrieval and the local catalog cache.
//!
//! Commands read the cached copy; only `opm update` (or the very first
//! command, when no cache exists) goes to the catalog location. Per-plugin
//! `{"manifest": url}` references are fetched during the update and inlined,
//! so the cached document is self-contained and parsing stays pure.

use super::Catalog;
use crate::constants::CATALOG_CACHE_FILE;
use crate::core::OpmError;
use crate::fetch::{ArtifactFetcher, local_path};
use crate::utils::fs::{atomic_write, remove_file_if_exists};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of [`CatalogSource::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The cache was replaced with a fresh copy
    Updated {
        plugins: usize,
        invalid: usize,
    },
    /// The location was unreachable; the previous cache stays in use
    UsedCache {
        reason: String,
    },
}

/// Where the catalog comes from and where its cached copy lives.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    location: String,
    cache_path: PathBuf,
}

impl CatalogSource {
    pub fn new(location: impl Into<String>, data_dir: &Path) -> Self {
        Self {
            location: location.into(),
            cache_path: data_dir.join(CATALOG_CACHE_FILE),
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    #[must_use]
    pub fn has_cache(&self) -> bool {
        self.cache_path.is_file()
    }

    /// When the cache was last written, if it exists.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let modified = std::fs::metadata(&self.cache_path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    /// Fetches the catalog, inlines manifests and atomically replaces the cache.
    ///
    /// A transport failure with an existing cache is not an error: the outcome
    /// reports that the cached copy stays in use. Without a cache it fails with
    /// [`OpmError::CatalogUnavailable`]. A fetched document that is rejected
    /// as a whole never replaces a good cache.
    pub async fn update<F: ArtifactFetcher>(&self, fetcher: &F) -> Result<UpdateOutcome> {
        let bytes = match fetcher.fetch(&self.location).await {
            Ok(bytes) => bytes,
            Err(e) if self.has_cache() => {
                warn!("Could not refresh catalog, using cached copy: {e}");
                return Ok(UpdateOutcome::UsedCache {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                return Err(OpmError::CatalogUnavailable {
                    location: self.location.clone(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let mut root: Value = serde_json::from_slice(&bytes)
            .map_err(|e| OpmError::document_format(format!("not valid JSON: {e}")))?;

        let base = parent_location(&self.location);
        if let Some(object) = root.as_object_mut() {
            if !object.contains_key("baseUrl") {
                object.insert("baseUrl".to_string(), Value::String(base.clone()));
            }
        }
        inline_manifests(&mut root, &base, fetcher).await;

        let catalog = Catalog::from_value(&root, Some(base.as_str()))?;
        let content = serde_json::to_vec_pretty(&root).context("Failed to serialize catalog")?;
        atomic_write(&self.cache_path, &content)
            .with_context(|| format!("Failed to write catalog cache {}", self.cache_path.display()))?;

        info!(
            "Catalog updated from {} ({} plugins)",
            self.location,
            catalog.all_plugins().len()
        );
        Ok(UpdateOutcome::Updated {
            plugins: catalog.all_plugins().len(),
            invalid: catalog.invalid_plugins().len(),
        })
    }

    /// Loads the cached catalog, performing the initial fetch if there is none.
    pub async fn load<F: ArtifactFetcher>(&self, fetcher: &F) -> Result<Catalog> {
        if !self.has_cache() {
            debug!("No cached catalog at {}, fetching", self.cache_path.display());
            self.update(fetcher).await?;
        }
        self.load_cached()
    }

    /// Loads the cached catalog without touching the network.
    pub fn load_cached(&self) -> Result<Catalog> {
        let document = std::fs::read_to_string(&self.cache_path).with_context(|| {
            format!("Failed to read catalog cache {}", self.cache_path.display())
        })?;
        let base = parent_location(&self.location);
        Ok(Catalog::parse_lenient(&document, Some(base.as_str()))?)
    }

    /// Deletes the cached catalog. Returns whether a cache existed.
    pub fn reset(&self) -> Result<bool> {
        remove_file_if_exists(&self.cache_path)
    }
}

/// Directory (or URL prefix) containing `location`.
pub(crate) fn parent_location(location: &str) -> String {
    if location.contains("://") && !location.starts_with("file://") {
        return match location.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => location.to_string(),
        };
    }
    let path = local_path(location).unwrap_or_else(|| PathBuf::from(location));
    let absolute = std::fs::canonicalize(&path).unwrap_or(path);
    absolute.parent().map_or_else(|| ".".to_string(), |p| p.display().to_string())
}

fn join_location(base: &str, relative: &str) -> String {
    if relative.contains("://") || Path::new(relative).is_absolute() {
        relative.to_string()
    } else if base.contains("://") {
        format!("{}/{}", base.trim_end_matches('/'), relative.trim_start_matches("./"))
    } else {
        Path::new(base).join(relative).display().to_string()
    }
}

/// Replaces `{"manifest": url}` plugin entries with the fetched manifest.
///
/// Failures are logged and leave the reference in place, so only that plugin
/// ends up quarantined.
async fn inline_manifests<F: ArtifactFetcher>(root: &mut Value, base: &str, fetcher: &F) {
    let Some(plugins) = root.get_mut("plugins").and_then(Value::as_object_mut) else {
        return;
    };

    for (name, entry) in plugins.iter_mut() {
        let Some(url) = manifest_reference(entry) else {
            continue;
        };
        let manifest_url = join_location(base, &url);
        debug!("Fetching manifest for '{name}' from {manifest_url}");

        let fetched = match fetcher.fetch(&manifest_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping plugin '{name}': {e}");
                continue;
            }
        };
        match serde_json::from_slice::<Value>(&fetched) {
            Ok(mut manifest) => {
                absolutize_binary_urls(&mut manifest, &parent_location(&manifest_url));
                *entry = manifest;
            }
            Err(e) => warn!("Skipping plugin '{name}': manifest is not valid JSON: {e}"),
        }
    }
}

pub(crate) fn manifest_reference(entry: &Value) -> Option<String> {
    let object = entry.as_object()?;
    if object.contains_key("versions") || object.contains_key("version") {
        return None;
    }
    object.get("manifest").and_then(Value::as_str).map(str::to_string)
}

/// Rewrites relative binary URLs in a manifest so they no longer depend on
/// the manifest's own location.
fn absolutize_binary_urls(manifest: &mut Value, manifest_base: &str) {
    let versions: Vec<&mut Value> = if manifest.get("versions").is_some_and(Value::is_array) {
        match manifest.get_mut("versions") {
            Some(Value::Array(list)) => list.iter_mut().collect(),
            _ => Vec::new(),
        }
    } else {
        vec![manifest]
    };
    for version in versions {
        if let Some(Value::Array(binaries)) = version.get_mut("binaries") {
            for binary in binaries {
                if let Some(Value::String(url)) = binary.get_mut("url") {
                    *url = join_location(manifest_base, url);
                }
            }
        }
    }
}
