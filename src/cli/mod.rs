//! Command-line interface for opm
//!
//! Each subcommand lives in its own module with a `clap::Args` struct and an
//! `execute` method taking the shared [`CliConfig`].
//!
//! # Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `update` | Refresh the cached catalog |
//! | `list` | List catalog plugins and their install status |
//! | `show` | Details of one plugin |
//! | `install` | Install plugins (names or glob patterns) |
//! | `remove` | Remove installed plugins |
//! | `upgrade` | Move installed plugins to newer compatible versions |
//! | `download` | Fetch a plugin library without installing it |
//! | `adopt` | Manage a library that was placed by hand |
//! | `info` | Paths, environment and catalog status |
//! | `validate` | Check a catalog or plugin manifest file |
//! | `reset` | Drop the catalog cache and optionally the installed state |
//! | `list-opcodes` | Opcodes provided by installed plugins |
//!
//! # Precedence
//!
//! Global flags override `OPM_*` environment variables (read through clap's
//! `env` support), which override the config file, which overrides built-in
//! defaults.
//!
//! # Exit status
//!
//! `0` on success, `1` when the command failed, `2` when some targets of a
//! batch failed, `130` when interrupted.

mod adopt;
pub mod common;
mod download;
mod info;
mod install;
mod list;
mod list_opcodes;
mod remove;
mod reset;
mod show;
mod update;
mod upgrade;
mod validate;


use crate::platform::HostVersion;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Settings derived from the global flags, passed to every command.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config_path: Option<PathBuf>,
    pub catalog: Option<String>,
    pub plugin_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub host_version: Option<HostVersion>,
    pub host_binary: Option<String>,
    pub max_parallel: Option<usize>,
    pub no_progress: bool,
}

#[derive(Parser)]
#[command(
    name = "opm",
    about = "Opcode Plugin Manager - install binary plugins for csound",
    version,
    long_about = "opm resolves, downloads and installs prebuilt csound plugins from a \
                  catalog, picking the build that matches this machine and the installed \
                  csound version."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (default: ~/.opm/config.toml)
    #[arg(long, global = true, env = "OPM_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog location: URL, file:// URL or path
    #[arg(long, global = true, env = "OPM_CATALOG_URL")]
    catalog: Option<String>,

    /// Directory plugins are installed to
    #[arg(long, global = true, env = "OPM_PLUGIN_DIR")]
    plugin_dir: Option<PathBuf>,

    /// Directory holding the catalog cache and installed state
    #[arg(long, global = true, env = "OPM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Assume this csound version instead of probing for it
    #[arg(long, global = true, env = "OPM_HOST_VERSION")]
    host_version: Option<HostVersion>,

    /// csound executable used to probe the host version
    #[arg(long, global = true, env = "OPM_HOST_BINARY")]
    host_binary: Option<String>,

    /// Maximum concurrent transitions in batch commands (1-8)
    #[arg(long, global = true, env = "OPM_MAX_PARALLEL")]
    max_parallel: Option<usize>,

    /// Disable progress indicators
    #[arg(long, global = true, env = "OPM_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the cached catalog
    Update(update::UpdateCommand),
    /// List plugins in the catalog
    List(list::ListCommand),
    /// Show details of a plugin
    Show(show::ShowCommand),
    /// Install plugins
    Install(install::InstallCommand),
    /// Remove installed plugins
    Remove(remove::RemoveCommand),
    /// Upgrade installed plugins
    Upgrade(upgrade::UpgradeCommand),
    /// Download a plugin library without installing it
    Download(download::DownloadCommand),
    /// Record a manually placed library as installed
    Adopt(adopt::AdoptCommand),
    /// Show paths, environment and catalog status
    Info(info::InfoCommand),
    /// Validate a catalog or plugin manifest
    Validate(validate::ValidateCommand),
    /// Remove the catalog cache
    Reset(reset::ResetCommand),
    /// List opcodes provided by installed plugins
    ListOpcodes(list_opcodes::ListOpcodesCommand),
}

impl Cli {
    /// Log filter for the verbosity flags, used when `RUST_LOG` is unset.
    #[must_use]
    pub const fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        CliConfig {
            config_path: self.config.clone(),
            catalog: self.catalog.clone(),
            plugin_dir: self.plugin_dir.clone(),
            data_dir: self.data_dir.clone(),
            host_version: self.host_version,
            host_binary: self.host_binary.clone(),
            max_parallel: self.max_parallel,
            no_progress: self.no_progress,
        }
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        match self.command {
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::List(cmd) => cmd.execute(&config).await,
            Commands::Show(cmd) => cmd.execute(&config).await,
            Commands::Install(cmd) => cmd.execute(&config).await,
            Commands::Remove(cmd) => cmd.execute(&config).await,
            Commands::Upgrade(cmd) => cmd.execute(&config).await,
            Commands::Download(cmd) => cmd.execute(&config).await,
            Commands::Adopt(cmd) => cmd.execute(&config).await,
            Commands::Info(cmd) => cmd.execute(&config).await,
            Commands::Validate(cmd) => cmd.execute(&config).await,
            Commands::Reset(cmd) => cmd.execute(&config).await,
            Commands::ListOpcodes(cmd) => cmd.execute(&config).await,
        }
    }
}
