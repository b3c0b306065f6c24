//! Test utilities for opm
//!
//! Shared by unit tests and, through the `test-utils` feature, by the
//! integration suite:
//! - [`init_test_logging`] wires `tracing` to the test writer
//! - [`FakeFetcher`] serves canned bytes and counts fetches
//! - [`zip_bytes`] builds in-memory zip archives
//! - [`catalog_document`] wraps a `plugins` object into a full catalog

use crate::core::OpmError;
use crate::fetch::ArtifactFetcher;
use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, at most once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging
/// stays off.
///
/// ```bash
/// RUST_LOG=opm_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// In-memory [`ArtifactFetcher`].
///
/// Unknown locations fail with [`OpmError::Download`], like an unreachable
/// server would.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    artifacts: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl FakeFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `bytes` for `location`.
    #[must_use]
    pub fn with(mut self, location: impl Into<String>, bytes: impl AsRef<[u8]>) -> Self {
        self.artifacts.insert(location.into(), bytes.as_ref().to_vec());
        self
    }

    /// Number of `fetch` calls so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ArtifactFetcher for FakeFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, OpmError>> + Send {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = self.artifacts.get(location).cloned().ok_or_else(|| OpmError::Download {
            url: location.to_string(),
            reason: "connection refused".to_string(),
        });
        std::future::ready(result)
    }
}

/// Builds a zip archive from `(entry name, content)` pairs.
///
/// # Panics
///
/// Panics if the archive cannot be written.
#[must_use]
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A schema 1 catalog document around `plugins`.
#[must_use]
pub fn catalog_document(plugins: serde_json::Value) -> String {
    serde_json::json!({
        "schemaVersion": "1",
        "plugins": plugins,
    })
    .to_string()
}
