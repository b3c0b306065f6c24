//! Show one plugin in detail.

use super::CliConfig;
use super::common::CommandContext;
use crate::catalog::Plugin;
use crate::resolver;
use crate::state::InstalledRecord;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ShowCommand {
    /// Plugin name
    name: String,

    /// Include binary URLs, archive entries and checksums
    #[arg(long)]
    full: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ShowJson<'a> {
    #[serde(flatten)]
    plugin: &'a Plugin,
    /// Version selected for this machine
    selected: Option<String>,
    installed: Option<&'a InstalledRecord>,
}

impl ShowCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let catalog = ctx.catalog(&ctx.fetcher()?).await?;
        let plugin = catalog.require(&self.name)?;
        let env = ctx.environment()?;
        let record = ctx.store.get(&plugin.name)?;
        let selected = resolver::resolve(plugin, &env).ok();

        if self.json {
            let doc = ShowJson {
                plugin,
                selected: selected.as_ref().map(|r| r.version.to_string()),
                installed: record.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&doc)?);
            return Ok(());
        }

        let Some(latest) = plugin.latest() else {
            println!("{}", plugin.name.bold());
            return Ok(());
        };

        println!("{} {}", plugin.name.bold(), latest.version);
        if !latest.summary.is_empty() {
            println!("{}", latest.summary);
        }
        if !latest.description.is_empty() && latest.description != latest.summary {
            println!();
            println!("{}", latest.description);
        }
        println!();

        let field = |label: &str, value: &str| {
            if !value.is_empty() {
                println!("{:<12} {}", format!("{label}:").dimmed(), value);
            }
        };
        field("author", &latest.author);
        field("email", &latest.email);
        field("repository", &latest.repository);
        field("library", &latest.libname);

        match &selected {
            Some(resolution) => field(
                "selected",
                &format!("{} ({})", resolution.version, resolution.binary.label()),
            ),
            None => field("selected", &format!("none for {} / host {}", env.platform, env.host_label())),
        }
        match &record {
            Some(record) => field(
                "installed",
                &format!("{} at {}", record.version, record.library_path.display()),
            ),
            None => field("installed", "no"),
        }

        if !latest.opcodes.is_empty() {
            println!();
            println!("{}", "Opcodes:".bold());
            println!("  {}", latest.opcodes.join(", "));
        }

        println!();
        println!("{}", "Versions:".bold());
        for version in plugin.versions.iter().rev() {
            println!("  {}", version.version.to_string().cyan());
            for binary in &version.binaries {
                println!("    {}", binary.label());
                if self.full {
                    println!("      url: {}", catalog.resolve_url(&binary.url));
                    if let Some(entry) = &binary.extract_path {
                        println!("      extractPath: {entry}");
                    }
                    if !binary.extra_files.is_empty() {
                        println!("      extraFiles: {}", binary.extra_files.join(", "));
                    }
                    if let Some(sha) = &binary.sha256 {
                        println!("      sha256: {sha}");
                    }
                    if let Some(build) = &binary.build_platform {
                        println!("      built on: {build}");
                    }
                }
            }
        }
        Ok(())
    }
}
