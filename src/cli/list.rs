//! List catalog plugins with their install status.

use super::CliConfig;
use super::common::CommandContext;
use crate::catalog::Catalog;
use crate::platform::Environment;
use crate::resolver;
use crate::state::InstalledState;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Only installed plugins
    #[arg(long, group = "filter")]
    installed: bool,

    /// Only installed plugins with a newer compatible version
    #[arg(long, group = "filter")]
    upgradeable: bool,

    /// Only plugins that are not installed
    #[arg(long, group = "filter")]
    not_installed: bool,

    /// Output as JSON
    #[arg(long, conflicts_with = "name_only")]
    json: bool,

    /// Print plugin names only
    #[arg(long)]
    name_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Installed,
    Upgradeable,
    /// Placed by hand and adopted
    Manual,
    NotInstalled,
    /// No build for this platform and host version
    Unavailable,
    /// The catalog entry failed validation
    Invalid,
}

impl Status {
    const fn is_installed(self) -> bool {
        matches!(self, Self::Installed | Self::Upgradeable | Self::Manual)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Upgradeable => "upgradeable",
            Self::Manual => "manual",
            Self::NotInstalled => "not installed",
            Self::Unavailable => "unavailable",
            Self::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRow {
    pub name: String,
    pub status: Status,
    /// Version that would be installed here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed: Option<String>,
    pub summary: String,
}

/// One row per declared plugin, plus installed plugins the catalog dropped.
pub fn build_rows(catalog: &Catalog, state: &InstalledState, env: &Environment) -> Vec<ListRow> {
    let mut rows: Vec<ListRow> = catalog
        .declared_names()
        .map(|name| {
            let record = state.get(name);
            let installed = record.map(|r| r.version.to_string());

            let Some(plugin) = catalog.lookup(name) else {
                return ListRow {
                    name: name.to_string(),
                    status: if record.is_some() { Status::Installed } else { Status::Invalid },
                    available: None,
                    installed,
                    summary: String::new(),
                };
            };

            let available = resolver::resolve(plugin, env).ok().map(|r| r.version);
            let status = match record {
                Some(r) if r.is_manual() => Status::Manual,
                Some(r) if available.as_ref().is_some_and(|v| *v > r.version) => {
                    Status::Upgradeable
                }
                Some(_) => Status::Installed,
                None if available.is_some() => Status::NotInstalled,
                None => Status::Unavailable,
            };

            ListRow {
                name: plugin.name.clone(),
                status,
                available: available.map(|v| v.to_string()),
                installed,
                summary: plugin.latest().map(|v| v.summary.clone()).unwrap_or_default(),
            }
        })
        .collect();

    for record in state.records() {
        if !rows.iter().any(|row| row.name == record.plugin_name) {
            rows.push(ListRow {
                name: record.plugin_name.clone(),
                status: if record.is_manual() { Status::Manual } else { Status::Installed },
                available: None,
                installed: Some(record.version.to_string()),
                summary: "(no longer in the catalog)".to_string(),
            });
        }
    }
    rows
}

impl ListCommand {
    fn keep(&self, row: &ListRow) -> bool {
        if self.installed {
            row.status.is_installed()
        } else if self.upgradeable {
            row.status == Status::Upgradeable
        } else if self.not_installed {
            !row.status.is_installed()
        } else {
            true
        }
    }

    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::new(cli).await?;
        let catalog = ctx.catalog(&ctx.fetcher()?).await?;
        let state = ctx.store.load()?;
        let env = ctx.environment()?;

        let rows: Vec<ListRow> =
            build_rows(&catalog, &state, &env).into_iter().filter(|row| self.keep(row)).collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }
        if self.name_only {
            for row in &rows {
                println!("{}", row.name);
            }
            return Ok(());
        }

        if rows.is_empty() {
            println!("No plugins found.");
            return Ok(());
        }

        let width = rows.iter().map(|row| row.name.len()).max().unwrap_or(0);
        for row in &rows {
            let version = match (&row.installed, &row.available) {
                (Some(installed), Some(available)) if row.status == Status::Upgradeable => {
                    format!("{installed} -> {available}")
                }
                (Some(installed), _) => installed.clone(),
                (None, Some(available)) => available.clone(),
                (None, None) => "-".to_string(),
            };
            let status = match row.status {
                Status::Installed => row.status.label().green(),
                Status::Upgradeable => row.status.label().yellow(),
                Status::Manual => row.status.label().cyan(),
                Status::NotInstalled => row.status.label().normal(),
                Status::Unavailable | Status::Invalid => row.status.label().dimmed(),
            };
            println!(
                "{:<width$}  {:<16}  {:<13}  {}",
                row.name.bold(),
                version,
                status,
                row.summary.dimmed()
            );
        }
        Ok(())
    }
}
