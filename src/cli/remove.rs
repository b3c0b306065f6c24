//! Remove installed plugins.

use super::CliConfig;
use super::common::{CommandContext, report_failure};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Installed plugin names
    #[arg(required = true)]
    plugins: Vec<String>,
}

impl RemoveCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let installer = ctx.local_installer()?;

        let report = installer.remove_many(&self.plugins).await;
        let status = report.check();

        for (target, result) in report.results {
            match result {
                Ok(record) => println!(
                    "{} Removed {} {}",
                    "✓".green(),
                    record.plugin_name.bold(),
                    record.version
                ),
                Err(e) => report_failure(&target, e),
            }
        }
        status?;
        Ok(())
    }
}
