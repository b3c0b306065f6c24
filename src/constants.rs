//! Global constants used throughout the opm codebase.
//!
//! File names, defaults and limits shared by several modules live here so
//! that magic values stay discoverable.

use std::time::Duration;

/// Catalog consulted when neither config nor environment name one.
pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/csound-plugins/risset-data/master/catalog.json";

/// Only major version of the catalog schema this build understands.
pub const SUPPORTED_SCHEMA_MAJOR: u64 = 1;

/// Name of the cached catalog inside the data directory.
pub const CATALOG_CACHE_FILE: &str = "catalog.json";

/// Name of the installed-state file inside the data directory.
pub const STATE_FILE: &str = "installed.toml";

/// Format version written at the top of the installed-state file.
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Host executable probed for its version.
pub const DEFAULT_HOST_BINARY: &str = "csound";

/// Host major version assumed for the default plugin directory when the
/// host cannot be probed.
pub const FALLBACK_HOST_MAJOR: u64 = 6;

/// Environment variable the host itself reads for an extra user plugin
/// directory.
pub const HOST_PLUGIN_DIR_ENV: &str = "CS_USER_PLUGINDIR";

/// Prefix of staging directories created inside the plugin directory.
pub const STAGING_PREFIX: &str = ".opm-staging-";

/// Sub-directory of the plugin directory holding per-plugin extra files.
pub const ASSETS_DIR: &str = "assets";

/// Default number of concurrent installs in a batch.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Upper bound for `--max-parallel`.
pub const MAX_PARALLEL_LIMIT: usize = 8;

/// Default per-request timeout for artifact and catalog downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of retries after a failed transfer.
pub const DEFAULT_DOWNLOAD_RETRIES: usize = 3;

/// Starting delay for exponential backoff between download retries (ms).
pub const BACKOFF_START_MS: u64 = 200;

/// Maximum backoff delay between download retries.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(5);

/// Age after which `info` flags the cached catalog as stale.
pub const STALE_CATALOG_DAYS: i64 = 30;
