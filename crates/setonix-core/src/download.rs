use std::path::Path;

use futures_util::StreamExt;
use log::{debug, info};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} failed with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("download of {url} was interrupted after {received} bytes: {source}")]
    Stream {
        url: String,
        received: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stream the body of `url` into `dest`, replacing whatever is there, and
/// return the number of bytes written.
///
/// Any error before or during the transfer fails the download; a partially
/// written `dest` is left for the caller's scratch-file cleanup.
///
/// # Errors
/// Returns an error when the request fails, the response status is anything
/// but 200 OK, the body stream breaks off or the file cannot be written.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let write_error = |source: std::io::Error| DownloadError::Write {
        path: dest.display().to_string(),
        source,
    };

    debug!("Downloading {url} to {}", dest.display());
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| DownloadError::Request {
            url: url.to_string(),
            source,
        })?;

    // A 206 carries only part of the body.
    if response.status() != reqwest::StatusCode::OK {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let mut file = tokio::fs::File::create(dest).await.map_err(write_error)?;
    let mut received: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DownloadError::Stream {
            url: url.to_string(),
            received,
            source,
        })?;
        file.write_all(&chunk).await.map_err(write_error)?;
        received += chunk.len() as u64;
    }

    file.flush().await.map_err(write_error)?;

    info!("Downloaded {received} bytes from {url}");
    Ok(received)
}
