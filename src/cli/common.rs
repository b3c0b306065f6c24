//! Shared setup for CLI commands

use super::CliConfig;
use crate::catalog::Catalog;
use crate::catalog::source::CatalogSource;
use crate::config::OpmConfig;
use crate::constants::{STALE_CATALOG_DAYS, STATE_FILE};
use crate::core::user_friendly_error;
use crate::fetch::HttpFetcher;
use crate::installer::Installer;
use crate::platform::{CommandProbe, Environment, default_plugin_dir, host_plugin_dir};
use crate::state::StateStore;
use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a command needs, resolved from flags, environment and config.
pub struct CommandContext {
    pub cli: CliConfig,
    pub config: OpmConfig,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub source: CatalogSource,
    pub store: Arc<StateStore>,
}

impl CommandContext {
    pub async fn new(cli: &CliConfig) -> Result<Self> {
        let config_path = match &cli.config_path {
            Some(path) => path.clone(),
            None => OpmConfig::default_path()?,
        };
        let config = OpmConfig::load(Some(&config_path)).await?;

        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => OpmConfig::default_dir()?,
        };
        let location = cli.catalog.clone().unwrap_or_else(|| config.catalog_url().to_string());
        debug!("Catalog: {location}, data directory: {}", data_dir.display());

        Ok(Self {
            cli: cli.clone(),
            source: CatalogSource::new(location, &data_dir),
            store: Arc::new(StateStore::new(data_dir.join(STATE_FILE))),
            config,
            config_path,
            data_dir,
        })
    }

    #[must_use]
    pub const fn show_progress(&self) -> bool {
        !self.cli.no_progress
    }

    pub fn fetcher(&self) -> Result<HttpFetcher> {
        Ok(HttpFetcher::new(
            self.config.download_timeout(),
            self.config.download_retries(),
            self.show_progress(),
        )?)
    }

    #[must_use]
    pub fn host_binary(&self) -> &str {
        self.cli.host_binary.as_deref().unwrap_or_else(|| self.config.host_binary())
    }

    /// Platform and host version; the probe is skipped with `--host-version`.
    pub fn environment(&self) -> Result<Environment> {
        let probe = CommandProbe::new(self.host_binary());
        Ok(Environment::detect(&probe, self.cli.host_version)?)
    }

    /// Flag or `OPM_PLUGIN_DIR`, then config file, then the host's
    /// `CS_USER_PLUGINDIR`, then the platform default.
    pub fn plugin_dir(&self, env: &Environment) -> Result<PathBuf> {
        if let Some(dir) = &self.cli.plugin_dir {
            return Ok(dir.clone());
        }
        if let Some(dir) = self.config.plugin_dir()? {
            return Ok(dir);
        }
        if let Some(dir) = host_plugin_dir() {
            debug!("Using CS_USER_PLUGINDIR: {}", dir.display());
            return Ok(dir);
        }
        Ok(default_plugin_dir(env.platform, env.host_version)?)
    }

    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.cli.max_parallel.unwrap_or_else(|| self.config.max_parallel())
    }

    /// Cached catalog, fetched first if there is no cache yet.
    pub async fn catalog(&self, fetcher: &HttpFetcher) -> Result<Catalog> {
        let catalog = self.source.load(fetcher).await?;
        if let Some(updated) = self.source.last_updated() {
            let age = (Utc::now() - updated).num_days();
            if age > STALE_CATALOG_DAYS {
                warn!("The catalog was last updated {age} days ago; run 'opm update'");
            }
        }
        Ok(catalog)
    }

    /// Installer over the full catalog.
    pub async fn installer(&self) -> Result<Installer<HttpFetcher>> {
        let fetcher = self.fetcher()?;
        let catalog = self.catalog(&fetcher).await?;
        self.installer_with(catalog, fetcher)
    }

    /// Installer for commands that work from local state alone.
    ///
    /// Uses the cached catalog when present and never touches the network.
    pub fn local_installer(&self) -> Result<Installer<HttpFetcher>> {
        let catalog = if self.source.has_cache() {
            self.source.load_cached()?
        } else {
            Catalog::empty()
        };
        self.installer_with(catalog, self.fetcher()?)
    }

    fn installer_with(
        &self,
        catalog: Catalog,
        fetcher: HttpFetcher,
    ) -> Result<Installer<HttpFetcher>> {
        let env = self.environment()?;
        let plugin_dir = self.plugin_dir(&env)?;
        debug!("Plugin directory: {}", plugin_dir.display());
        Ok(Installer::new(Arc::new(catalog), env, Arc::clone(&self.store), plugin_dir, fetcher)
            .with_max_parallel(self.max_parallel()))
    }
}

/// Prints a failed batch target with its suggestion.
pub fn report_failure(target: &str, error: anyhow::Error) {
    let context = user_friendly_error(error);
    eprintln!("{} {}: {}", "✗".red(), target.bold(), context.error);
    if let Some(details) = &context.details {
        eprintln!("    {}", details.dimmed());
    }
    if let Some(suggestion) = &context.suggestion {
        eprintln!("    {}: {}", "suggestion".green(), suggestion);
    }
}

/// Reads a file given on the command line.
pub fn read_input(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
