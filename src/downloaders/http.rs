//! HTTP client with cancellable streaming and progress tracking

use std::path::Path;

use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::HumanBytes;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ErrorKind, StageError, StageResult};
use crate::installer::progress::Reporter;

/// Largest slice written to disk between cancellation checks
pub const CHUNK_SIZE: usize = 8192;

/// Upper end of the fetch stage's progress band
pub const FETCH_PROGRESS_END: u8 = 50;

/// Shared HTTP client.
///
/// No connect/read/request deadlines are configured: a stalled download is
/// only interrupted by cancellation.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vscode-installer/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Fetch-stage percentage for `downloaded` of `total` bytes
pub fn fetch_percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let scaled = (downloaded.min(total) as u128 * FETCH_PROGRESS_END as u128) / total as u128;
    scaled as u8
}

/// Stream `url` into `output_path`.
///
/// Progress is reported on the `[0, 50]` band when the server declares a
/// length. The token is checked before every chunk write; a cancelled fetch
/// leaves the partial file behind for the workspace to remove.
pub async fn fetch_archive(
    client: &HttpClient,
    url: &str,
    output_path: &Path,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> StageResult<u64> {
    debug!("GET {}", truncate_url(url));

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(StageError::Cancelled),
        result = client.inner().get(url).send() => result.map_err(network_error)?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StageError::failed(
            ErrorKind::NetworkFailure,
            format!("HTTP {} - {}", status.as_u16(), truncate_error(&body)),
        ));
    }

    let total_size = response.content_length().filter(|len| *len > 0);
    match total_size {
        Some(total) => info!("Downloading {} from {}", HumanBytes(total), truncate_url(url)),
        None => info!("Downloading from {} (size unknown)", truncate_url(url)),
    }

    let mut file = File::create(output_path).await.map_err(|e| {
        StageError::failed(
            ErrorKind::IoFailure,
            format!("Failed to create {}: {}", output_path.display(), e),
        )
    })?;

    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = file.flush().await;
                return Err(StageError::Cancelled);
            }
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(network_error)?;

        for piece in chunk.chunks(CHUNK_SIZE) {
            if cancel.is_cancelled() {
                debug!("Download cancelled after {} bytes", downloaded);
                let _ = file.flush().await;
                return Err(StageError::Cancelled);
            }

            file.write_all(piece).await.map_err(|e| write_error(output_path, e))?;
            downloaded += piece.len() as u64;

            if let Some(total) = total_size {
                reporter.advance(fetch_percent(downloaded, total), || {
                    format!("Downloaded {} of {}", HumanBytes(downloaded), HumanBytes(total))
                });
            }
        }
    }

    file.flush().await.map_err(|e| write_error(output_path, e))?;

    if cancel.is_cancelled() {
        return Err(StageError::Cancelled);
    }

    debug!("Downloaded {} bytes to {}", downloaded, output_path.display());
    Ok(downloaded)
}

fn network_error(err: reqwest::Error) -> StageError {
    StageError::failed(ErrorKind::NetworkFailure, err.to_string())
}

fn write_error(path: &Path, err: std::io::Error) -> StageError {
    StageError::failed(
        ErrorKind::IoFailure,
        format!("Failed to write {}: {}", path.display(), err),
    )
}

/// Truncate URL for log lines
fn truncate_url(url: &str) -> String {
    if url.chars().count() > 80 {
        let head: String = url.chars().take(77).collect();
        format!("{}...", head)
    } else {
        url.to_string()
    }
}

/// Truncate error body for display
fn truncate_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 100 {
        let head: String = trimmed.chars().take(97).collect();
        format!("{}...", head)
    } else if trimmed.is_empty() {
        "No details".to_string()
    } else {
        trimmed.to_string()
    }
}
