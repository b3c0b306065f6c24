//! Error handling for opm
//!
//! This module provides the strongly-typed error enum used throughout the crate and the
//! user-facing error reporting used by the CLI. Errors follow two rules:
//! 1. **Strongly-typed errors** so callers can react to a precise failure kind
//! 2. **User-friendly messages** with an actionable suggestion when one exists
//!
//! # Architecture
//!
//! - [`OpmError`] - Enumerated error kinds for every failure the core can report
//! - [`ErrorContext`] - Wrapper that adds details and suggestions for terminal output
//!
//! # Error Categories
//!
//! - **Catalog**: [`OpmError::CatalogFormat`], [`OpmError::CatalogUnavailable`],
//!   [`OpmError::PluginNotFound`]
//! - **Environment**: [`OpmError::UnsupportedPlatform`], [`OpmError::HostNotFound`]
//! - **Resolution**: [`OpmError::NoCompatibleBinary`]
//! - **Transfer**: [`OpmError::Download`], [`OpmError::ChecksumMismatch`],
//!   [`OpmError::Extraction`]
//! - **Local state**: [`OpmError::NotInstalled`], [`OpmError::AlreadyInstalled`],
//!   [`OpmError::CorruptState`], [`OpmError::DestinationExists`]
//! - **Batches**: [`OpmError::BatchFailed`]
//!
//! Use [`user_friendly_error`] to convert any [`anyhow::Error`] into an [`ErrorContext`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use opm_cli::core::{OpmError, user_friendly_error};
//!
//! fn remove(name: &str) -> Result<(), OpmError> {
//!     Err(OpmError::NotInstalled { name: name.to_string() })
//! }
//!
//! if let Err(e) = remove("nope") {
//!     let ctx = user_friendly_error(anyhow::Error::from(e));
//!     ctx.display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for opm operations
///
/// Each variant carries the values a user needs to understand the failure (plugin
/// names, paths, URLs). Variants are cheap to clone so that batch commands can keep
/// a copy per target while still propagating the error.
///
/// # Recoverability
///
/// - [`HostNotFound`] degrades: resolution continues with an unknown host version
/// - [`Download`] is transient: re-running the install is safe
/// - [`CatalogFormat`] is fatal for the affected plugin only
/// - [`CorruptState`] is never resolved automatically
///
/// # Examples
///
/// ```rust,no_run
/// use opm_cli::core::OpmError;
///
/// fn report(error: &OpmError) {
///     match error {
///         OpmError::NoCompatibleBinary { plugin, platform, .. } => {
///             eprintln!("{plugin} is not available for {platform}");
///         }
///         OpmError::Download { url, .. } => eprintln!("retry later: {url}"),
///         other => eprintln!("{other}"),
///     }
/// }
/// ```
///
/// [`HostNotFound`]: OpmError::HostNotFound
/// [`Download`]: OpmError::Download
/// [`CatalogFormat`]: OpmError::CatalogFormat
/// [`CorruptState`]: OpmError::CorruptState
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpmError {
    /// The catalog document, or one plugin entry within it, is malformed
    ///
    /// When `plugin` is `None` the whole document was rejected (for example an
    /// unsupported `schemaVersion`). Otherwise only the named plugin is unusable.
    #[error("Invalid catalog{}: {reason}", plugin_suffix(.plugin))]
    CatalogFormat {
        /// The plugin whose entry is malformed, if the error is plugin-scoped
        plugin: Option<String>,
        /// What is wrong with the entry
        reason: String,
    },

    /// No catalog could be loaded, neither from its location nor from the cache
    #[error("Catalog unavailable at {location}: {reason}")]
    CatalogUnavailable {
        /// The URL or path that was tried
        location: String,
        /// Why retrieval failed
        reason: String,
    },

    /// The OS/architecture combination has no platform tag
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system reported by the probe
        os: String,
        /// CPU architecture reported by the probe
        arch: String,
    },

    /// The host runtime could not be located or its version not parsed
    ///
    /// This error is recoverable. Resolution proceeds with an unknown host
    /// version, which only range-free binaries satisfy.
    #[error("Host runtime not found: {reason}")]
    HostNotFound {
        /// Why the probe failed
        reason: String,
    },

    /// The plugin exists but has no binary for this platform and host version
    #[error("Plugin '{plugin}' has no binary for {platform} (host version {host_version})")]
    NoCompatibleBinary {
        /// Plugin name
        plugin: String,
        /// The caller's platform tag
        platform: String,
        /// The host version used for matching, or `unknown`
        host_version: String,
        /// The `platform range` pairs the catalog does provide
        available: Vec<String>,
    },

    /// The catalog has no plugin with this name
    #[error("Plugin '{name}' not found in catalog")]
    PluginNotFound {
        /// The name that was looked up
        name: String,
        /// Closest catalog name, if any is similar enough
        suggestion: Option<String>,
    },

    /// Retrieving an artifact failed
    #[error("Failed to download {url}: {reason}")]
    Download {
        /// The artifact location
        url: String,
        /// Transport or HTTP failure description
        reason: String,
    },

    /// The fetched artifact does not hash to the catalog's sha256
    #[error("Checksum mismatch for '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Plugin name
        name: String,
        /// Hash declared by the catalog
        expected: String,
        /// Hash of the fetched bytes
        actual: String,
    },

    /// An entry could not be extracted from a fetched archive
    #[error("Failed to extract '{entry}' from {archive}: {reason}")]
    Extraction {
        /// Archive location
        archive: String,
        /// Entry that was requested
        entry: String,
        /// Why extraction failed
        reason: String,
    },

    /// The plugin has no installed record
    #[error("Plugin '{name}' is not installed")]
    NotInstalled {
        /// Plugin name
        name: String,
    },

    /// A library for this plugin already exists and is not managed by opm
    #[error("Plugin '{name}' is already present at {path}")]
    AlreadyInstalled {
        /// Plugin name
        name: String,
        /// Path of the existing library
        path: String,
    },

    /// A download destination is already occupied
    #[error("Destination already exists: {path}")]
    DestinationExists {
        /// The occupied path
        path: String,
    },

    /// The installed-state file exists but cannot be read
    #[error("Installed-state file is unreadable: {path}")]
    CorruptState {
        /// Path to the state file
        path: String,
        /// Parser or I/O error
        reason: String,
    },

    /// Some targets of a batch command failed
    ///
    /// Each failure has already been reported individually; this error only
    /// carries the counts so the process can exit with a distinct status.
    #[error("{failed} of {total} targets failed")]
    BatchFailed {
        /// Number of failed targets
        failed: usize,
        /// Number of requested targets
        total: usize,
    },

    /// Configuration file or flag problem
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Catch-all for errors without a dedicated kind
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

fn plugin_suffix(plugin: &Option<String>) -> String {
    plugin.as_ref().map(|p| format!(" entry for '{p}'")).unwrap_or_default()
}

impl OpmError {
    /// Shorthand for a plugin-scoped [`OpmError::CatalogFormat`]
    pub fn catalog_format(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CatalogFormat {
            plugin: Some(plugin.into()),
            reason: reason.into(),
        }
    }

    /// Shorthand for a document-scoped [`OpmError::CatalogFormat`]
    pub fn document_format(reason: impl Into<String>) -> Self {
        Self::CatalogFormat {
            plugin: None,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation can succeed without user action
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::CatalogUnavailable { .. })
    }
}

/// Error wrapper with user-friendly details and suggestions
///
/// `ErrorContext` wraps an [`OpmError`] and adds an optional suggestion and optional
/// details. It is how the CLI presents errors.
///
/// # Display Format
///
/// 1. **error**: the main message in red
/// 2. **details**: additional context in yellow (optional)
/// 3. **suggestion**: what to do next in green (optional)
///
/// # Examples
///
/// ```rust,no_run
/// use opm_cli::core::{OpmError, ErrorContext};
///
/// let context = ErrorContext::new(OpmError::NotInstalled { name: "poly".into() })
///     .with_suggestion("Run 'opm list --installed' to see installed plugins");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: OpmError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details
    #[must_use]
    pub const fn new(error: OpmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes, in order:
/// - [`OpmError`] anywhere in the error chain, with a per-variant suggestion
/// - [`std::io::Error`] with filesystem guidance
/// - [`toml::de::Error`] with syntax guidance
/// - anything else, with the full cause chain in the message
///
/// # Examples
///
/// ```rust,no_run
/// use opm_cli::core::user_friendly_error;
///
/// let context = user_friendly_error(anyhow::anyhow!("Something went wrong"));
/// context.display();
/// ```
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(opm_error) = error.chain().find_map(|e| e.downcast_ref::<OpmError>()) {
        let mut ctx = create_error_context(opm_error.clone());
        // Keep the outer context messages, they usually name the command target
        let outer: Vec<String> = error
            .chain()
            .take_while(|e| e.downcast_ref::<OpmError>().is_none())
            .map(ToString::to_string)
            .collect();
        if !outer.is_empty() && ctx.details.is_none() {
            ctx.details = Some(outer.join(": "));
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(OpmError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion(
                    "Check ownership of the plugin directory or choose another one with --plugin-dir",
                );
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(OpmError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(OpmError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax: quotes, brackets and key names");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(OpmError::Other {
        message,
    })
}

/// Map each [`OpmError`] variant to an [`ErrorContext`] with tailored guidance
fn create_error_context(error: OpmError) -> ErrorContext {
    let (suggestion, details): (Option<String>, Option<String>) = match &error {
        OpmError::CatalogFormat { plugin: Some(_), .. } => (
            Some("Run 'opm update' to refresh the catalog, or report the entry to its maintainer".into()),
            None,
        ),
        OpmError::CatalogFormat { plugin: None, .. } => (
            Some("Run 'opm update' or check the catalog location with 'opm info'".into()),
            Some("The catalog document itself was rejected, so no plugin can be resolved".into()),
        ),
        OpmError::CatalogUnavailable { .. } => (
            Some("Check your network connection or set OPM_CATALOG_URL to a reachable catalog".into()),
            None,
        ),
        OpmError::UnsupportedPlatform { .. } => (
            None,
            Some("Supported platforms: linux, linux-arm64, macos, macos-arm64, windows".into()),
        ),
        OpmError::HostNotFound { .. } => {
            (Some("Install csound, set OPM_HOST_BINARY, or pass --host-version".into()), None)
        }
        OpmError::NoCompatibleBinary { available, .. } => {
            let details = if available.is_empty() {
                "The catalog lists no binaries for this plugin".to_string()
            } else {
                format!("Available builds: {}", available.join(", "))
            };
            (
                Some("Use 'opm show <name> --full' to inspect builds, or 'opm download --platform' for another machine".into()),
                Some(details),
            )
        }
        OpmError::PluginNotFound { suggestion, .. } => {
            let hint = match suggestion {
                Some(close) => format!("Did you mean '{close}'?"),
                None => "Run 'opm list' to see available plugins".to_string(),
            };
            (Some(hint), None)
        }
        OpmError::Download { .. } => (
            Some("This is usually transient; re-running the command is safe".into()),
            Some("Nothing was placed in the plugin directory and no record was written".into()),
        ),
        OpmError::ChecksumMismatch { .. } => (
            Some("Run 'opm update' and try again; if it persists the published artifact changed".into()),
            Some("The artifact was discarded before reaching the plugin directory".into()),
        ),
        OpmError::Extraction { .. } => (
            Some("The archive layout may not match the catalog's extractPath; report it upstream".into()),
            None,
        ),
        OpmError::NotInstalled { .. } => {
            (Some("Run 'opm list --installed' to see installed plugins".into()), None)
        }
        OpmError::AlreadyInstalled { .. } => (
            Some("Use --force to replace it, or 'opm adopt <name>' to manage the existing file".into()),
            Some("The library was placed manually, so opm will not overwrite it silently".into()),
        ),
        OpmError::DestinationExists { .. } => {
            (Some("Remove the file or choose another directory with --path".into()), None)
        }
        OpmError::CorruptState { reason, .. } => (
            Some("Inspect the file, or run 'opm reset --state' to start from an empty state".into()),
            Some(format!("{reason}. opm never deletes the state file on its own")),
        ),
        OpmError::BatchFailed { .. } => (None, Some("Each failure is listed above".into())),
        OpmError::ConfigError { .. } => {
            (Some("Check the config file shown by 'opm info'".into()), None)
        }
        OpmError::Other { .. } => (None, None),
    };

    ErrorContext {
        error,
        suggestion,
        details,
    }
}
