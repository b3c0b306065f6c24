//! Install plugins from the catalog.

use super::CliConfig;
use super::common::{CommandContext, report_failure};
use crate::installer::{InstallOptions, InstallOutcome};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Plugin names or glob patterns (`"*"` installs everything available)
    #[arg(required = true)]
    plugins: Vec<String>,

    /// Reinstall the same version, or replace a library placed by hand
    #[arg(short, long)]
    force: bool,
}

impl InstallCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let installer = ctx.installer().await?;

        let options = InstallOptions {
            force: self.force,
        };
        let report = installer.install_many(&self.plugins, options).await;
        let status = report.check();

        for (target, result) in report.results {
            match result {
                Ok(InstallOutcome::Installed {
                    version,
                    path,
                    previous,
                }) => {
                    let from = match previous {
                        Some(previous) if previous != version => format!(" (was {previous})"),
                        Some(_) => " (reinstalled)".to_string(),
                        None => String::new(),
                    };
                    println!(
                        "{} Installed {} {}{} to {}",
                        "✓".green(),
                        target.bold(),
                        version,
                        from,
                        path.display()
                    );
                }
                Ok(InstallOutcome::AlreadyInstalled { version, .. }) => {
                    println!("{} {} {} is already installed", "-".dimmed(), target.bold(), version);
                }
                Err(e) => report_failure(&target, e),
            }
        }
        status?;
        Ok(())
    }
}
