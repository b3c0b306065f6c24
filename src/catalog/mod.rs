//! Catalog model: the registry of plugins, versions and per-platform binaries
//!
//! A catalog is a JSON document:
//!
//! ```json
//! {
//!   "schemaVersion": "1",
//!   "baseUrl": "https://example.org/plugins",
//!   "plugins": {
//!     "poly": {
//!       "versions": [{
//!         "version": "1.10.0",
//!         "abstract": "Polyphonic opcodes",
//!         "opcodes": ["poly", "polyseq"],
//!         "binaries": [
//!           {"platform": "linux", "hostVersion": ">=6.14<7.0",
//!            "url": "poly-linux.zip", "extractPath": "libpoly.so",
//!            "sha256": "..."}
//!         ]
//!       }]
//!     }
//!   }
//! }
//! ```
//!
//! Parsing is pure: it never performs I/O. Retrieval and caching of the
//! document live in [`source`].
//!
//! # Parse modes
//!
//! - [`Catalog::parse`] is strict: any malformed plugin rejects the document.
//!   `opm validate` uses it.
//! - [`Catalog::parse_lenient`] rejects only document-level problems. A
//!   malformed plugin entry is quarantined so it fails on its own when used,
//!   while the rest of the catalog stays usable.
//!
//! # Examples
//!
//! ```rust,no_run
//! use opm_cli::catalog::Catalog;
//!
//! # fn example(doc: &str) -> anyhow::Result<()> {
//! let catalog = Catalog::parse_lenient(doc, None)?;
//! for plugin in catalog.all_plugins() {
//!     println!("{} ({} versions)", plugin.name, plugin.versions.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod model;
pub mod range;
pub mod source;

#[cfg(test)]
mod tests;

pub use model::{Binary, Plugin, PluginVersion};
pub use range::VersionRange;

use crate::constants::SUPPORTED_SCHEMA_MAJOR;
use crate::core::OpmError;
use crate::utils::closest_match;
use serde_json::Value;
use std::path::Path;

/// A plugin entry that failed validation, kept so the failure surfaces when
/// the plugin is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPlugin {
    pub name: String,
    pub error: OpmError,
}

/// Parsed catalog snapshot, immutable for the duration of a command.
#[derive(Debug, Clone)]
pub struct Catalog {
    schema_version: String,
    base: Option<String>,
    plugins: Vec<Plugin>,
    invalid: Vec<InvalidPlugin>,
    /// Every declared name in document order
    order: Vec<String>,
}

impl Catalog {
    /// A catalog without plugins, for commands that only touch local state.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema_version: SUPPORTED_SCHEMA_MAJOR.to_string(),
            base: None,
            plugins: Vec::new(),
            invalid: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Strict parse: every plugin must be valid.
    ///
    /// `base` is the directory or URL prefix that relative binary URLs are
    /// resolved against when the document carries no `baseUrl`.
    ///
    /// # Errors
    ///
    /// [`OpmError::CatalogFormat`] on invalid JSON, a missing or unsupported
    /// `schemaVersion`, a missing `plugins` mapping, or any invalid plugin.
    pub fn parse(document: &str, base: Option<&str>) -> Result<Self, OpmError> {
        let catalog = Self::parse_lenient(document, base)?;
        if let Some(first) = catalog.invalid.first() {
            return Err(first.error.clone());
        }
        Ok(catalog)
    }

    /// Lenient parse: document-level problems are fatal, per-plugin problems
    /// are quarantined.
    pub fn parse_lenient(document: &str, base: Option<&str>) -> Result<Self, OpmError> {
        let root: Value = serde_json::from_str(document)
            .map_err(|e| OpmError::document_format(format!("not valid JSON: {e}")))?;
        Self::from_value(&root, base)
    }

    /// Builds a catalog from an already decoded document.
    pub fn from_value(root: &Value, base: Option<&str>) -> Result<Self, OpmError> {
        let object = root
            .as_object()
            .ok_or_else(|| OpmError::document_format("document is not a JSON object"))?;

        let schema_version = check_schema_version(object.get("schemaVersion"))?;

        let plugins_value = object
            .get("plugins")
            .ok_or_else(|| OpmError::document_format("missing field `plugins`"))?;
        let entries = plugins_value
            .as_object()
            .ok_or_else(|| OpmError::document_format("`plugins` is not a mapping"))?;

        let base = object
            .get("baseUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| base.map(str::to_string));

        let mut plugins = Vec::new();
        let mut invalid = Vec::new();
        let mut order = Vec::with_capacity(entries.len());

        for (name, value) in entries {
            order.push(name.clone());
            match model::parse_plugin(name, value) {
                Ok(plugin) => plugins.push(plugin),
                Err(error) => {
                    tracing::debug!("Quarantined catalog entry '{name}': {error}");
                    invalid.push(InvalidPlugin {
                        name: name.clone(),
                        error,
                    });
                }
            }
        }

        Ok(Self {
            schema_version,
            base,
            plugins,
            invalid,
            order,
        })
    }

    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Valid plugin by name, ASCII case-insensitive.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Like [`lookup`](Self::lookup) but explains why a name is unusable.
    ///
    /// # Errors
    ///
    /// - [`OpmError::CatalogFormat`] when the entry exists but was quarantined
    /// - [`OpmError::PluginNotFound`] with a "did you mean" hint otherwise
    pub fn require(&self, name: &str) -> Result<&Plugin, OpmError> {
        if let Some(plugin) = self.lookup(name) {
            return Ok(plugin);
        }
        if let Some(bad) = self.invalid.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
            return Err(bad.error.clone());
        }
        Err(OpmError::PluginNotFound {
            name: name.to_string(),
            suggestion: closest_match(name, self.order.iter().map(String::as_str)),
        })
    }

    /// Valid plugins in declaration order.
    #[must_use]
    pub fn all_plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Quarantined entries in declaration order.
    #[must_use]
    pub fn invalid_plugins(&self) -> &[InvalidPlugin] {
        &self.invalid
    }

    /// All declared names, valid or not, in declaration order.
    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Resolves a binary URL against the catalog base.
    ///
    /// Absolute URLs and absolute paths are returned unchanged.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") || Path::new(url).is_absolute() {
            return url.to_string();
        }
        match &self.base {
            Some(base) if base.contains("://") => {
                format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches("./"))
            }
            Some(base) => Path::new(base).join(url).display().to_string(),
            None => url.to_string(),
        }
    }
}

fn check_schema_version(value: Option<&Value>) -> Result<String, OpmError> {
    let text = match value {
        None | Some(Value::Null) => {
            return Err(OpmError::document_format("missing field `schemaVersion`"));
        }
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(OpmError::document_format(format!("invalid schemaVersion {other}")));
        }
    };

    let major = text.split('.').next().and_then(|m| m.parse::<u64>().ok());
    match major {
        Some(SUPPORTED_SCHEMA_MAJOR) => Ok(text),
        _ => Err(OpmError::document_format(format!(
            "unsupported schemaVersion '{text}' (this opm understands {SUPPORTED_SCHEMA_MAJOR})"
        ))),
    }
}
