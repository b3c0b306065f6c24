//! opm - Opcode Plugin Manager
//!
//! A package manager for prebuilt csound plugin libraries. opm reads a
//! catalog of plugins, picks the build that matches this machine's platform
//! and csound version, places it where csound discovers plugins, and records
//! what it installed so that listing, upgrading and removing stay truthful.
//!
//! # Architecture Overview
//!
//! One command loads the catalog once, captures the environment once and
//! hands both to the installer:
//!
//! ```text
//! catalog::source ──> Catalog ──┐
//!                                ├──> resolver ──> installer ──> plugin directory
//! platform ────> Environment ────┘                    │
//!                                                     └──> state (installed.toml)
//! ```
//!
//! # Core Modules
//!
//! - [`catalog`] - Typed catalog model, strict parsing, and the cached copy
//! - [`platform`] - Platform tags, host version probing, plugin directories
//! - [`resolver`] - Selects the best compatible version and binary
//! - [`state`] - Persisted record of installed plugins
//! - [`installer`] - Install, remove, upgrade, download and adopt transitions
//!
//! ## Supporting Modules
//!
//! - [`cli`] - Command-line interface
//! - [`config`] - User configuration (`~/.opm/config.toml`)
//! - [`core`] - Error types and user-facing error formatting
//! - [`fetch`] - Artifact retrieval over HTTP, `file://` and local paths
//! - [`utils`] - Filesystem, checksum and progress helpers
//!
//! # Catalog Format
//!
//! ```json
//! {
//!   "schemaVersion": "1",
//!   "plugins": {
//!     "poly": {
//!       "versions": [
//!         {
//!           "version": "1.10.0",
//!           "abstract": "Run multiple copies of an opcode in parallel",
//!           "opcodes": ["poly", "poly0", "polyseq"],
//!           "binaries": [
//!             {"platform": "linux", "hostVersion": ">=6.14", "url": "linux/libpoly.so"},
//!             {"platform": "windows", "url": "https://example.org/poly-win.zip", "extractPath": "poly.dll"}
//!           ]
//!         }
//!       ]
//!     },
//!     "else": {"manifest": "else/manifest.json"}
//!   }
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod fetch;
pub mod installer;
pub mod platform;
pub mod resolver;
pub mod state;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
