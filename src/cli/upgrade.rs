//! Upgrade installed plugins to newer compatible versions.

use super::CliConfig;
use super::common::{CommandContext, report_failure};
use crate::installer::UpgradeOutcome;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct UpgradeCommand {
    /// Plugins to upgrade (default: every installed plugin)
    plugins: Vec<String>,
}

impl UpgradeCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        if self.plugins.is_empty() && ctx.store.load()?.is_empty() {
            println!("No plugins installed.");
            return Ok(());
        }

        let installer = ctx.installer().await?;
        let report = installer.upgrade_many(&self.plugins).await?;
        let status = report.check();

        for (target, result) in report.results {
            match result {
                Ok(UpgradeOutcome::Upgraded { from, to, .. }) => {
                    println!("{} Upgraded {} {} -> {}", "✓".green(), target.bold(), from, to);
                }
                Ok(UpgradeOutcome::AlreadyCurrent { version }) => {
                    println!("{} {} {} is up to date", "-".dimmed(), target.bold(), version);
                }
                Ok(UpgradeOutcome::SkippedManual) => println!(
                    "{} Skipping {}: installed manually (use 'opm install --force {}')",
                    "!".yellow(),
                    target.bold(),
                    target
                ),
                Err(e) => report_failure(&target, e),
            }
        }
        status?;
        Ok(())
    }
}
