//! Install, remove and upgrade transitions against the plugin directory.
//!
//! The [`Installer`] is the only component that touches the plugin directory
//! and the installed-state file. Every install walks the same states:
//!
//! ```text
//! NotInstalled -> Resolved -> Fetched -> Placed -> Recorded
//!        \            \           \          \
//!         `------------`-----------`----------`--> Failed
//! ```
//!
//! Each transition is logged at debug level with the plugin name.
//!
//! # Atomicity
//!
//! Artifacts are fetched and extracted into a hidden staging directory
//! (`.opm-staging-*`) created inside the plugin directory, so the final
//! placement is a same-filesystem rename. The staging directory is removed
//! when its guard drops, including when the future is cancelled. A library
//! only becomes visible at its final path once it has been fully fetched,
//! verified and extracted; the record is written after that. If writing the
//! record fails for a fresh install the placed file is rolled back.
//!
//! # Concurrency
//!
//! Batch operations run targets concurrently. A semaphore bounds how many
//! transitions are in flight, and a per-name async mutex serializes
//! transitions of the same plugin. Separate opm processes are only
//! coordinated through rename: the last writer wins.

mod extract;


pub use extract::{ArchiveExtractor, ZipExtractor};

use crate::catalog::model::base_name;
use crate::catalog::{Binary, Catalog, Plugin};
use crate::constants::{ASSETS_DIR, DEFAULT_MAX_PARALLEL, MAX_PARALLEL_LIMIT, STAGING_PREFIX};
use crate::core::OpmError;
use crate::fetch::ArtifactFetcher;
use crate::platform::{Environment, PlatformTag};
use crate::resolver::{self, Resolution};
use crate::state::{InstalledRecord, Provenance, StateStore};
use crate::utils::checksum;
use crate::utils::fs::{
    atomic_move, ensure_dir, make_executable, remove_dir_if_empty, remove_file_if_exists,
};
use anyhow::{Context, Result};
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use semver::Version;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Lifecycle of one install transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotInstalled,
    Resolved,
    Fetched,
    Placed,
    Recorded,
    Failed,
}

/// Tracks and logs the state of a single transition.
struct Transition<'a> {
    name: &'a str,
    state: InstallState,
}

impl<'a> Transition<'a> {
    const fn new(name: &'a str) -> Self {
        Self {
            name,
            state: InstallState::NotInstalled,
        }
    }

    fn advance(&mut self, next: InstallState) {
        debug!("{}: {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Reinstall the same version and overwrite unmanaged libraries
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        version: Version,
        path: PathBuf,
        previous: Option<Version>,
    },
    /// The resolved version was already recorded and present; nothing fetched
    AlreadyInstalled { version: Version, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Upgraded {
        from: Version,
        to: Version,
        path: PathBuf,
    },
    AlreadyCurrent { version: Version },
    /// Manual records are never replaced by `upgrade`
    SkippedManual,
}

/// Per-target results of a batch operation, in request order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub results: Vec<(String, Result<T>)>,
}

impl<T> BatchReport<T> {
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// [`OpmError::BatchFailed`] when any target failed.
    pub fn check(&self) -> Result<(), OpmError> {
        match self.failed() {
            0 => Ok(()),
            failed => Err(OpmError::BatchFailed {
                failed,
                total: self.total(),
            }),
        }
    }
}

/// Files produced in the staging directory.
struct Staged {
    library: PathBuf,
    extras: Vec<PathBuf>,
    checksum: String,
}

/// Drives install transitions for one catalog and environment.
pub struct Installer<F> {
    catalog: Arc<Catalog>,
    env: Environment,
    store: Arc<StateStore>,
    plugin_dir: PathBuf,
    fetcher: F,
    extractor: Box<dyn ArchiveExtractor>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    permits: Semaphore,
}

impl<F: ArtifactFetcher> Installer<F> {
    pub fn new(
        catalog: Arc<Catalog>,
        env: Environment,
        store: Arc<StateStore>,
        plugin_dir: impl Into<PathBuf>,
        fetcher: F,
    ) -> Self {
        Self {
            catalog,
            env,
            store,
            plugin_dir: plugin_dir.into(),
            fetcher,
            extractor: Box::new(ZipExtractor),
            locks: DashMap::new(),
            permits: Semaphore::new(DEFAULT_MAX_PARALLEL),
        }
    }

    /// Bounds concurrent transitions, clamped to `1..=8`.
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.permits = Semaphore::new(max_parallel.clamp(1, MAX_PARALLEL_LIMIT));
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks.entry(name.to_string()).or_default().clone()
    }

    /// Installs the best binary of `name` for the current environment.
    ///
    /// # Errors
    ///
    /// - [`OpmError::PluginNotFound`] / [`OpmError::CatalogFormat`] from the catalog
    /// - [`OpmError::NoCompatibleBinary`] when nothing matches the environment
    /// - [`OpmError::AlreadyInstalled`] when an unmanaged file occupies the
    ///   target path and `force` is unset
    /// - [`OpmError::Download`], [`OpmError::ChecksumMismatch`],
    ///   [`OpmError::Extraction`] from fetching the artifact
    pub async fn install(&self, name: &str, options: InstallOptions) -> Result<InstallOutcome> {
        let plugin = self.catalog.require(name)?;
        let _permit = self.permits.acquire().await.context("Installer is shutting down")?;
        let lock = self.lock_for(&plugin.name);
        let _guard = lock.lock().await;
        self.install_locked(plugin, options).await
    }

    async fn install_locked(
        &self,
        plugin: &Plugin,
        options: InstallOptions,
    ) -> Result<InstallOutcome> {
        let mut transition = Transition::new(&plugin.name);
        let result = self.run_install(plugin, options, &mut transition).await;
        if let Err(e) = &result {
            transition.advance(InstallState::Failed);
            debug!("{}: {e:#}", plugin.name);
        }
        result
    }

    async fn run_install(
        &self,
        plugin: &Plugin,
        options: InstallOptions,
        transition: &mut Transition<'_>,
    ) -> Result<InstallOutcome> {
        let resolution = resolver::resolve(plugin, &self.env)?;
        transition.advance(InstallState::Resolved);

        let previous = self.store.get(&plugin.name)?;
        let target = self.plugin_dir.join(resolution.binary.library_file_name());

        if !options.force {
            match &previous {
                Some(record) if record.is_manual() => {
                    return Err(OpmError::AlreadyInstalled {
                        name: plugin.name.clone(),
                        path: record.library_path.display().to_string(),
                    }
                    .into());
                }
                Some(record) if record.version == resolution.version => {
                    if record.library_exists() {
                        info!("{} {} is already installed", plugin.name, record.version);
                        return Ok(InstallOutcome::AlreadyInstalled {
                            version: record.version.clone(),
                            path: record.library_path.clone(),
                        });
                    }
                    warn!(
                        "Library of {} vanished from {}; reinstalling",
                        plugin.name,
                        record.library_path.display()
                    );
                }
                None if target.exists() => {
                    return Err(OpmError::AlreadyInstalled {
                        name: plugin.name.clone(),
                        path: target.display().to_string(),
                    }
                    .into());
                }
                _ => {}
            }
        }

        ensure_dir(&self.plugin_dir)?;
        let staging = staging_dir(&self.plugin_dir)?;

        let url = self.catalog.resolve_url(&resolution.binary.url);
        let bytes = self.fetch_artifact(&plugin.name, &url).await?;
        let bytes = match &resolution.binary.sha256 {
            Some(expected) => verify_checksum(&plugin.name, bytes, expected)?,
            None => bytes,
        };
        transition.advance(InstallState::Fetched);

        let staged = self.unpack(&resolution.binary, &url, &bytes, staging.path(), true)?;
        let extra_files = self.place_extras(&plugin.name, &staged.extras)?;
        atomic_move(&staged.library, &target)?;
        transition.advance(InstallState::Placed);

        let record = InstalledRecord {
            plugin_name: plugin.name.clone(),
            version: resolution.version.clone(),
            library_path: target.clone(),
            provenance: Provenance::Catalog,
            installed_at: Utc::now(),
            platform: Some(self.env.platform),
            checksum: Some(staged.checksum),
            extra_files: extra_files.clone(),
            source_url: Some(url),
        };
        if let Err(e) = self.store.put(record) {
            if previous.is_none() {
                warn!("Rolling back {} after failing to record it", target.display());
                for path in std::iter::once(&target).chain(&extra_files) {
                    let _ = remove_file_if_exists(path);
                }
            }
            return Err(e.context(format!("Failed to record installation of {}", plugin.name)));
        }
        transition.advance(InstallState::Recorded);

        if let Some(old) = &previous {
            self.remove_superseded(old, &target, &extra_files);
        }

        info!("Installed {} {} to {}", plugin.name, resolution.version, target.display());
        Ok(InstallOutcome::Installed {
            version: resolution.version,
            path: target,
            previous: previous.map(|r| r.version),
        })
    }

    async fn fetch_artifact(&self, name: &str, url: &str) -> Result<Vec<u8>, OpmError> {
        debug!("{name}: fetching {url}");
        self.fetcher.fetch(url).await
    }

    /// Writes the library (and optionally the extra files) into `staging`.
    fn unpack(
        &self,
        binary: &Binary,
        url: &str,
        bytes: &[u8],
        staging: &Path,
        with_extras: bool,
    ) -> Result<Staged> {
        let library = staging.join(binary.library_file_name());
        let mut extras = Vec::new();

        match &binary.extract_path {
            Some(entry) => {
                self.extractor.extract(url, bytes, entry, &library)?;
                if with_extras {
                    let extra_dir = staging.join("extra");
                    for entry in &binary.extra_files {
                        let dest = extra_dir.join(base_name(entry));
                        self.extractor.extract(url, bytes, entry, &dest)?;
                        extras.push(dest);
                    }
                }
            }
            None => std::fs::write(&library, bytes)
                .with_context(|| format!("Failed to stage {}", library.display()))?,
        }

        make_executable(&library)?;
        let checksum = checksum::file_checksum(&library)?;
        Ok(Staged {
            library,
            extras,
            checksum,
        })
    }

    /// Moves staged extra files to `<plugin_dir>/assets/<name>/`.
    fn place_extras(&self, name: &str, staged: &[PathBuf]) -> Result<Vec<PathBuf>> {
        if staged.is_empty() {
            return Ok(Vec::new());
        }
        let dir = self.assets_dir(name);
        ensure_dir(&dir)?;

        let mut placed = Vec::with_capacity(staged.len());
        for file in staged {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let dest = dir.join(file_name);
            atomic_move(file, &dest)?;
            placed.push(dest);
        }
        Ok(placed)
    }

    fn assets_dir(&self, name: &str) -> PathBuf {
        self.plugin_dir.join(ASSETS_DIR).join(name)
    }

    /// Deletes files of `old` that the new install no longer uses.
    fn remove_superseded(&self, old: &InstalledRecord, library: &Path, extras: &[PathBuf]) {
        let stale = std::iter::once(&old.library_path)
            .filter(|p| p.as_path() != library)
            .chain(old.extra_files.iter().filter(|p| !extras.contains(*p)));
        for path in stale {
            match remove_file_if_exists(path) {
                Ok(true) => debug!("Removed superseded {}", path.display()),
                Ok(false) => {}
                Err(e) => warn!("{e:#}"),
            }
        }
    }

    /// Deletes the library, extra files and record of an installed plugin.
    ///
    /// A library that is already gone only produces a warning.
    ///
    /// # Errors
    ///
    /// [`OpmError::NotInstalled`] when there is no record; the state is left
    /// unchanged.
    pub async fn remove(&self, name: &str) -> Result<InstalledRecord> {
        let key = self.record_key(name)?;
        let _permit = self.permits.acquire().await.context("Installer is shutting down")?;
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let record = self.store.get(&key)?.ok_or_else(|| OpmError::NotInstalled {
            name: name.to_string(),
        })?;

        if !remove_file_if_exists(&record.library_path)? {
            warn!(
                "Library of {} was already missing: {}",
                record.plugin_name,
                record.library_path.display()
            );
        }
        for extra in &record.extra_files {
            if let Err(e) = remove_file_if_exists(extra) {
                warn!("{e:#}");
            }
        }
        let assets = self.assets_dir(&record.plugin_name);
        remove_dir_if_empty(&assets);
        if let Some(parent) = assets.parent() {
            remove_dir_if_empty(parent);
        }

        self.store.remove(&key)?;
        info!("Removed {} {}", record.plugin_name, record.version);
        Ok(record)
    }

    /// Moves an installed plugin to a strictly newer compatible version.
    ///
    /// Never downgrades. Manual records are skipped.
    pub async fn upgrade(&self, name: &str) -> Result<UpgradeOutcome> {
        let key = self.record_key(name)?;
        let _permit = self.permits.acquire().await.context("Installer is shutting down")?;
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let record = self.store.get(&key)?.ok_or_else(|| OpmError::NotInstalled {
            name: name.to_string(),
        })?;
        if record.is_manual() {
            info!("Skipping {}: installed manually", record.plugin_name);
            return Ok(UpgradeOutcome::SkippedManual);
        }

        let plugin = match self.catalog.require(&key) {
            Ok(plugin) => plugin,
            Err(OpmError::PluginNotFound { .. }) => {
                info!("{key} is no longer in the catalog; keeping {}", record.version);
                return Ok(UpgradeOutcome::AlreadyCurrent {
                    version: record.version,
                });
            }
            Err(err) => return Err(err.into()),
        };
        let Some(newer) = resolver::resolve_newer_than(plugin, &self.env, &record.version)? else {
            return Ok(UpgradeOutcome::AlreadyCurrent {
                version: record.version,
            });
        };
        debug!("{}: {} -> {}", key, record.version, newer.version);

        match self.install_locked(plugin, InstallOptions { force: true }).await? {
            InstallOutcome::Installed { version, path, .. } => Ok(UpgradeOutcome::Upgraded {
                from: record.version,
                to: version,
                path,
            }),
            InstallOutcome::AlreadyInstalled { version, .. } => {
                Ok(UpgradeOutcome::AlreadyCurrent { version })
            }
        }
    }

    /// Fetches the library for `platform` (default: current) into `dest_dir`
    /// without recording anything.
    ///
    /// # Errors
    ///
    /// [`OpmError::DestinationExists`] when the file is already there.
    pub async fn download(
        &self,
        name: &str,
        platform: Option<PlatformTag>,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let plugin = self.catalog.require(name)?;
        let env = Environment::new(platform.unwrap_or(self.env.platform), self.env.host_version);
        let Resolution { version, binary, .. } = resolver::resolve(plugin, &env)?;

        let target = dest_dir.join(binary.library_file_name());
        if target.exists() {
            return Err(OpmError::DestinationExists {
                path: target.display().to_string(),
            }
            .into());
        }

        ensure_dir(dest_dir)?;
        let staging = staging_dir(dest_dir)?;
        let url = self.catalog.resolve_url(&binary.url);
        let bytes = self.fetch_artifact(&plugin.name, &url).await?;
        let bytes = match &binary.sha256 {
            Some(expected) => verify_checksum(&plugin.name, bytes, expected)?,
            None => bytes,
        };
        let staged = self.unpack(&binary, &url, &bytes, staging.path(), false)?;
        atomic_move(&staged.library, &target)?;

        info!("Downloaded {} {} ({}) to {}", plugin.name, version, env.platform, target.display());
        Ok(target)
    }

    /// Records a library already sitting in the plugin directory as manual.
    pub async fn adopt(&self, name: &str) -> Result<InstalledRecord> {
        let plugin = self.catalog.require(name)?;
        let lock = self.lock_for(&plugin.name);
        let _guard = lock.lock().await;

        if let Some(record) = self.store.get(&plugin.name)? {
            return Err(OpmError::AlreadyInstalled {
                name: plugin.name.clone(),
                path: record.library_path.display().to_string(),
            }
            .into());
        }

        let candidates = plugin.library_file_names(self.env.platform);
        let path = candidates
            .iter()
            .map(|file| self.plugin_dir.join(file))
            .find(|path| path.is_file())
            .ok_or_else(|| OpmError::Other {
                message: format!(
                    "No library of '{}' found in {} (looked for: {})",
                    plugin.name,
                    self.plugin_dir.display(),
                    if candidates.is_empty() {
                        "nothing for this platform".to_string()
                    } else {
                        candidates.join(", ")
                    }
                ),
            })?;

        let record = InstalledRecord {
            plugin_name: plugin.name.clone(),
            version: Version::new(0, 0, 0),
            checksum: Some(checksum::file_checksum(&path)?),
            library_path: path,
            provenance: Provenance::Manual,
            installed_at: Utc::now(),
            platform: Some(self.env.platform),
            extra_files: Vec::new(),
            source_url: None,
        };
        self.store.put(record.clone())?;
        info!("Adopted {} at {}", record.plugin_name, record.library_path.display());
        Ok(record)
    }

    /// Installs every target concurrently; glob patterns expand against the
    /// catalog.
    pub async fn install_many(
        &self,
        targets: &[String],
        options: InstallOptions,
    ) -> BatchReport<InstallOutcome> {
        let targets = expand_targets(&self.catalog, targets);
        let results = join_all(targets.iter().map(|target| async move {
            (target.clone(), self.install(target, options).await)
        }))
        .await;
        BatchReport { results }
    }

    pub async fn remove_many(&self, targets: &[String]) -> BatchReport<InstalledRecord> {
        let targets = dedup(targets.iter().cloned());
        let results = join_all(
            targets.iter().map(|target| async move { (target.clone(), self.remove(target).await) }),
        )
        .await;
        BatchReport { results }
    }

    /// Upgrades `names`, or every installed plugin when empty.
    pub async fn upgrade_many(&self, names: &[String]) -> Result<BatchReport<UpgradeOutcome>> {
        let targets = if names.is_empty() {
            self.store.load()?.plugins.into_keys().collect()
        } else {
            dedup(names.iter().cloned())
        };
        let results = join_all(
            targets.iter().map(|target| async move { (target.clone(), self.upgrade(target).await) }),
        )
        .await;
        Ok(BatchReport { results })
    }

    /// Key of the record matching `name`, ignoring ASCII case.
    fn record_key(&self, name: &str) -> Result<String> {
        let state = self.store.load()?;
        if state.plugins.contains_key(name) {
            return Ok(name.to_string());
        }
        state
            .plugins
            .into_keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                OpmError::NotInstalled {
                    name: name.to_string(),
                }
                .into()
            })
    }
}

fn staging_dir(parent: &Path) -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .with_context(|| format!("Failed to create staging directory in {}", parent.display()))
}

fn verify_checksum(name: &str, bytes: Vec<u8>, expected: &str) -> Result<Vec<u8>, OpmError> {
    match checksum::verify(&bytes, expected) {
        Ok(()) => Ok(bytes),
        Err(actual) => Err(OpmError::ChecksumMismatch {
            name: name.to_string(),
            expected: checksum::normalize(expected),
            actual,
        }),
    }
}

/// Expands glob targets against the declared plugin names.
///
/// Patterns without a match stay as typed so that they surface as
/// [`OpmError::PluginNotFound`]. The result is de-duplicated ignoring case.
pub fn expand_targets(catalog: &Catalog, targets: &[String]) -> Vec<String> {
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };

    let mut expanded = Vec::new();
    for target in targets {
        let is_pattern = target.contains(['*', '?', '[']);
        let matches: Vec<String> = match glob::Pattern::new(target) {
            Ok(pattern) if is_pattern => catalog
                .declared_names()
                .filter(|name| pattern.matches_with(name, options))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        if matches.is_empty() {
            expanded.push(target.clone());
        } else {
            expanded.extend(matches);
        }
    }
    dedup(expanded)
}

fn dedup(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|name| seen.insert(name.to_ascii_lowercase())).collect()
}
