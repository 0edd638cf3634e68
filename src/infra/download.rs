//! HTTP bundle access
//!
//! A thin reqwest wrapper used by the fetch, roll, and wait flows. The
//! interesting part is the error split: a remote 404 is a distinguishable
//! `BundleNotFound`, which callers use to decide between "deploy", "must
//! build", and "keep polling"; every other failure is fatal.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;

/// Outcome of a cheap existence probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The remote object exists
    Found,
    /// The remote answered 404
    NotFound,
}

/// HTTP client for bundle downloads and probes
#[derive(Debug, Clone)]
pub struct DownloadClient {
    client: reqwest::Client,
}

impl DownloadClient {
    /// Create a client with sane timeouts
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Cheap HEAD existence probe
    pub async fn probe(&self, url: &str) -> Result<Probe, DownloadError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError {
                url: url.to_string(),
                error: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(Probe::NotFound)
        } else if response.status().is_success() {
            Ok(Probe::Found)
        } else {
            Err(DownloadError::NetworkError {
                url: url.to_string(),
                error: format!("unexpected status {}", response.status()),
            })
        }
    }

    /// Stream a download to a file
    ///
    /// Returns the number of bytes written. A 404 maps to
    /// [`DownloadError::BundleNotFound`].
    pub async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError {
                url: url.to_string(),
                error: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DownloadError::BundleNotFound {
                url: url.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(DownloadError::NetworkError {
                url: url.to_string(),
                error: format!("unexpected status {}", response.status()),
            });
        }

        let io_error = |e: std::io::Error| DownloadError::IoError {
            path: dest.to_path_buf(),
            error: e.to_string(),
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::NetworkError {
                url: url.to_string(),
                error: e.to_string(),
            })?;
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        Ok(written)
    }
}

impl Default for DownloadClient {
    fn default() -> Self {
        Self::new()
    }
}
