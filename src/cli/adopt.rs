//! Take over a library that was placed by hand.

use super::CliConfig;
use super::common::CommandContext;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct AdoptCommand {
    /// Plugin name as listed in the catalog
    name: String,
}

impl AdoptCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let installer = ctx.installer().await?;

        let record = installer.adopt(&self.name).await?;
        println!(
            "{} Recorded {} at {} as manually installed",
            "✓".green(),
            record.plugin_name.bold(),
            record.library_path.display()
        );
        Ok(())
    }
}
