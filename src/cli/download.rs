//! Fetch a plugin library without installing it.

use super::CliConfig;
use super::common::CommandContext;
use crate::platform::PlatformTag;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DownloadCommand {
    /// Plugin name
    name: String,

    /// Target platform (default: this machine)
    #[arg(long)]
    platform: Option<PlatformTag>,

    /// Destination directory (default: current directory)
    #[arg(long)]
    path: Option<PathBuf>,
}

impl DownloadCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let installer = ctx.installer().await?;

        let dest = match self.path {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let path = installer.download(&self.name, self.platform, &dest).await?;
        println!("{} Downloaded {} to {}", "✓".green(), self.name.bold(), path.display());
        Ok(())
    }
}
