//! Paths, environment and catalog status.

use super::CliConfig;
use super::common::CommandContext;
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InfoCommand {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Info {
    version: &'static str,
    config_file: PathBuf,
    data_dir: PathBuf,
    state_file: PathBuf,
    catalog_location: String,
    catalog_cache: PathBuf,
    catalog_updated: Option<DateTime<Utc>>,
    catalog_age_days: Option<i64>,
    schema_version: Option<String>,
    platform: String,
    host_binary: String,
    host_version: String,
    plugin_dir: PathBuf,
    installed: Vec<String>,
}

impl InfoCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let env = ctx.environment()?;
        let updated = ctx.source.last_updated();
        // Never fetches; the cache may not exist yet
        let schema_version = ctx
            .source
            .has_cache()
            .then(|| ctx.source.load_cached().ok())
            .flatten()
            .map(|catalog| catalog.schema_version().to_string());

        let info = Info {
            version: env!("CARGO_PKG_VERSION"),
            config_file: ctx.config_path.clone(),
            data_dir: ctx.data_dir.clone(),
            state_file: ctx.store.path().to_path_buf(),
            catalog_location: ctx.source.location().to_string(),
            catalog_cache: ctx.source.cache_path().to_path_buf(),
            catalog_updated: updated,
            catalog_age_days: updated.map(|t| (Utc::now() - t).num_days()),
            schema_version,
            platform: env.platform.to_string(),
            host_binary: ctx.host_binary().to_string(),
            host_version: env.host_label(),
            plugin_dir: ctx.plugin_dir(&env)?,
            installed: ctx.store.load()?.plugins.into_keys().collect(),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
            return Ok(());
        }

        let line =
            |label: &str, value: String| println!("{:<18} {}", format!("{label}:").bold(), value);
        line("opm version", info.version.to_string());
        line("config file", info.config_file.display().to_string());
        line("data directory", info.data_dir.display().to_string());
        line("state file", info.state_file.display().to_string());
        line("catalog", info.catalog_location.clone());
        line("catalog cache", info.catalog_cache.display().to_string());
        line(
            "catalog updated",
            match (info.catalog_updated, info.catalog_age_days) {
                (Some(time), Some(days)) => {
                    format!("{} ({days} days ago)", time.format("%Y-%m-%d %H:%M"))
                }
                _ => "never".to_string(),
            },
        );
        line("schema version", info.schema_version.clone().unwrap_or_else(|| "-".to_string()));
        line("platform", info.platform.clone());
        line("host binary", info.host_binary.clone());
        line("host version", info.host_version.clone());
        line("plugin directory", info.plugin_dir.display().to_string());
        line(
            "installed",
            if info.installed.is_empty() { "none".to_string() } else { info.installed.join(", ") },
        );
        Ok(())
    }
}
