//! Retrieval of catalog documents and plugin artifacts.
//!
//! [`ArtifactFetcher`] is the seam between the core and the network. The
//! default [`HttpFetcher`] understands `http(s)://` URLs, `file://` URLs and
//! plain filesystem paths, retries transient transport failures with
//! exponential backoff, and shows a byte counter while downloading.

use crate::constants::{
    BACKOFF_START_MS, DEFAULT_DOWNLOAD_RETRIES, DEFAULT_DOWNLOAD_TIMEOUT, MAX_BACKOFF_DELAY,
};
use crate::core::OpmError;
use crate::utils::progress::ProgressBar;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::debug;

/// Fetches the raw bytes behind a location.
///
/// Implementations must map every failure to [`OpmError::Download`] so that
/// callers can treat it as transient.
pub trait ArtifactFetcher: Send + Sync {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, OpmError>> + Send;
}

/// Default fetcher backed by `reqwest` and the local filesystem.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retries: usize,
    show_progress: bool,
}

struct Attempt {
    error: OpmError,
    retryable: bool,
}

impl HttpFetcher {
    /// Builds a fetcher with a per-request timeout and retry budget.
    pub fn new(timeout: Duration, retries: usize, show_progress: bool) -> Result<Self, OpmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("opm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OpmError::Other {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            retries,
            show_progress,
        })
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>, Attempt> {
        let fail = |reason: String, retryable: bool| Attempt {
            error: OpmError::Download {
                url: url.to_string(),
                reason,
            },
            retryable,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string(), e.is_timeout() || e.is_connect() || e.is_request()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}"), status.is_server_error()));
        }

        let bar = if self.show_progress {
            ProgressBar::new_download(response.content_length().unwrap_or(0))
        } else {
            ProgressBar::hidden()
        };
        bar.set_prefix(crate::catalog::model::base_name(url));

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| fail(e.to_string(), true))? {
            bytes.extend_from_slice(&chunk);
            bar.inc(chunk.len() as u64);
        }
        bar.finish_and_clear();
        Ok(bytes)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_DOWNLOAD_RETRIES, false).unwrap_or_else(|_| Self {
            client: reqwest::Client::new(),
            retries: DEFAULT_DOWNLOAD_RETRIES,
            show_progress: false,
        })
    }
}

impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, OpmError> {
        if let Some(path) = local_path(location) {
            debug!("Reading {}", path.display());
            return tokio::fs::read(&path).await.map_err(|e| OpmError::Download {
                url: location.to_string(),
                reason: e.to_string(),
            });
        }

        debug!("Downloading {location}");
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(BACKOFF_START_MS / 2)
            .max_delay(MAX_BACKOFF_DELAY)
            .map(jitter)
            .take(self.retries);

        RetryIf::start(
            strategy,
            || self.fetch_http(location),
            |attempt: &Attempt| {
                if attempt.retryable {
                    debug!("Retrying after: {}", attempt.error);
                }
                attempt.retryable
            },
        )
        .await
        .map_err(|attempt| attempt.error)
    }
}

/// Filesystem path for `file://` URLs and plain paths, `None` for remote URLs.
#[must_use]
pub fn local_path(location: &str) -> Option<PathBuf> {
    if let Some(rest) = location.strip_prefix("file://") {
        // file:///C:/x on Windows
        let rest = if cfg!(windows) { rest.trim_start_matches('/') } else { rest };
        return Some(PathBuf::from(rest));
    }
    if location.contains("://") {
        None
    } else {
        Some(PathBuf::from(location))
    }
}
