//! Opcodes provided by installed plugins.

use super::CliConfig;
use super::common::CommandContext;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;

#[derive(Args, Debug)]
pub struct ListOpcodesCommand {
    /// Output as JSON (opcode -> plugin)
    #[arg(long)]
    json: bool,
}

impl ListOpcodesCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let catalog = ctx.catalog(&ctx.fetcher()?).await?;
        let state = ctx.store.load()?;

        let mut opcodes: BTreeMap<String, String> = BTreeMap::new();
        for record in state.records() {
            let Some(plugin) = catalog.lookup(&record.plugin_name) else {
                continue;
            };
            // Manual records carry no real version; describe them with the latest one
            let version = plugin.version(&record.version).or_else(|| plugin.latest());
            for opcode in version.iter().flat_map(|v| &v.opcodes) {
                opcodes.insert(opcode.clone(), plugin.name.clone());
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&opcodes)?);
            return Ok(());
        }
        if opcodes.is_empty() {
            println!("No opcodes: no installed plugin declares any.");
            return Ok(());
        }
        let width = opcodes.keys().map(String::len).max().unwrap_or(0);
        for (opcode, plugin) in &opcodes {
            println!("{:<width$}  {}", opcode.bold(), plugin.dimmed());
        }
        Ok(())
    }
}
