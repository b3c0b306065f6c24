//! Refresh the cached catalog.

use super::CliConfig;
use super::common::CommandContext;
use crate::catalog::source::UpdateOutcome;
use crate::resolver;
use crate::utils::progress::ProgressBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct UpdateCommand {}

impl UpdateCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let fetcher = ctx.fetcher()?;

        let spinner =
            if ctx.show_progress() { ProgressBar::new_spinner() } else { ProgressBar::hidden() };
        spinner.set_message(format!("Fetching catalog from {}", ctx.source.location()));
        let outcome = ctx.source.update(&fetcher).await;
        spinner.finish_and_clear();

        match outcome? {
            UpdateOutcome::Updated { plugins, invalid } => {
                println!("{} Catalog updated: {plugins} plugins", "✓".green());
                if invalid > 0 {
                    println!(
                        "{} {invalid} catalog entries are invalid and cannot be installed \
                         (see 'opm list')",
                        "!".yellow()
                    );
                }
            }
            UpdateOutcome::UsedCache { reason } => {
                println!(
                    "{} Could not refresh the catalog ({reason}); using the cached copy",
                    "!".yellow()
                );
                return Ok(());
            }
        }

        let state = ctx.store.load()?;
        if state.is_empty() {
            return Ok(());
        }
        let catalog = ctx.source.load_cached()?;
        let env = ctx.environment()?;
        let upgradeable: Vec<&str> = state
            .records()
            .filter(|record| !record.is_manual())
            .filter(|record| {
                catalog.lookup(&record.plugin_name).is_some_and(|plugin| {
                    matches!(
                        resolver::resolve_newer_than(plugin, &env, &record.version),
                        Ok(Some(_))
                    )
                })
            })
            .map(|record| record.plugin_name.as_str())
            .collect();
        if !upgradeable.is_empty() {
            println!(
                "Upgrades available for {}; run 'opm upgrade'",
                upgradeable.join(", ").bold()
            );
        }
        Ok(())
    }
}
