//! Strict validation of a catalog document or a single plugin manifest.

use super::CliConfig;
use super::common::read_input;
use crate::catalog::model::parse_plugin;
use crate::catalog::source::manifest_reference;
use crate::catalog::{Catalog, Plugin};
use crate::core::OpmError;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Catalog (`catalog.json`) or plugin manifest file
    file: PathBuf,
}

/// Problems found in one document.
#[derive(Debug, Default)]
pub struct Findings {
    pub plugins: usize,
    pub errors: Vec<OpmError>,
    /// Overlapping host ranges, accepted but worth a look
    pub warnings: Vec<String>,
    /// Entries pointing at external manifests
    pub unresolved: Vec<String>,
}

/// Validates a decoded document. `fallback_name` names a manifest without a
/// `name` field.
pub fn validate_document(root: &Value, fallback_name: &str) -> Result<Findings, OpmError> {
    let mut findings = Findings::default();

    if root.get("plugins").is_none() {
        let name = root.get("name").and_then(Value::as_str).unwrap_or(fallback_name);
        match parse_plugin(name, root) {
            Ok(plugin) => {
                findings.plugins = 1;
                findings.warnings.extend(overlaps(&plugin));
            }
            Err(e) => findings.errors.push(e),
        }
        return Ok(findings);
    }

    let mut root = root.clone();
    if let Some(Value::Object(entries)) = root.get_mut("plugins") {
        entries.retain(|name, entry| {
            let external = manifest_reference(entry).is_some();
            if external {
                findings.unresolved.push(name.clone());
            }
            !external
        });
    }

    let catalog = Catalog::from_value(&root, None)?;
    findings.plugins = catalog.all_plugins().len();
    findings.errors.extend(catalog.invalid_plugins().iter().map(|p| p.error.clone()));
    for plugin in catalog.all_plugins() {
        findings.warnings.extend(overlaps(plugin));
    }
    Ok(findings)
}

fn overlaps(plugin: &Plugin) -> Vec<String> {
    plugin
        .versions
        .iter()
        .flat_map(|version| {
            version.overlapping_binaries().into_iter().map(move |(a, b)| {
                format!(
                    "{} {}: host ranges of '{}' and '{}' overlap",
                    plugin.name,
                    version.version,
                    a.label(),
                    b.label()
                )
            })
        })
        .collect()
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

impl ValidateCommand {
    pub async fn execute(self, _cli: &CliConfig) -> Result<()> {
        let content = read_input(&self.file)?;
        let root: Value = serde_json::from_str(&content)
            .map_err(|e| OpmError::document_format(format!("not valid JSON: {e}")))?;

        let findings = validate_document(&root, &file_stem(&self.file))?;

        for error in &findings.errors {
            eprintln!("{} {error}", "✗".red());
        }
        for warning in &findings.warnings {
            println!("{} {warning}", "!".yellow());
        }
        if !findings.unresolved.is_empty() {
            println!(
                "{} {} entries reference external manifests and were not checked: {}",
                "-".dimmed(),
                findings.unresolved.len(),
                findings.unresolved.join(", ")
            );
        }

        if findings.errors.is_empty() {
            println!(
                "{} {} is valid ({} plugins)",
                "✓".green(),
                self.file.display(),
                findings.plugins
            );
            Ok(())
        } else {
            Err(OpmError::document_format(format!(
                "{} invalid plugin entries in {}",
                findings.errors.len(),
                self.file.display()
            ))
            .into())
        }
    }
}
