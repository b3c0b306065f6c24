//! Drop the catalog cache and optionally the installed state.

use super::CliConfig;
use super::common::CommandContext;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ResetCommand {
    /// Also reset the installed-state file; installed libraries stay on disk
    #[arg(long)]
    state: bool,
}

impl ResetCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;

        if ctx.source.reset()? {
            println!(
                "{} Removed catalog cache {}",
                "✓".green(),
                ctx.source.cache_path().display()
            );
        } else {
            println!("{} No catalog cache to remove", "-".dimmed());
        }

        if self.state {
            ctx.store.reset()?;
            println!("{} Reset installed state {}", "✓".green(), ctx.store.path().display());
        }
        Ok(())
    }
}
