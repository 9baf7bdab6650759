use std::path::{Path, PathBuf};

use reqwest::Client;
use uuid::Uuid;

use crate::types::{DecodedImage, DownloadError};

/// Fetches the full response body of a plain GET.
///
/// Any transport failure, a malformed URL, or a non-success HTTP status
/// is reported as `DownloadError::Network`. The body is read in one go;
/// no partial decode is attempted.
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, DownloadError> {
    log::info!("[fetch_bytes] GET {}", url);

    let response = client.get(url).send().await?.error_for_status()?;
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let body = response.bytes().await?;
    log::debug!(
        "[fetch_bytes] {}: received {} bytes (content_type={:?})",
        url,
        body.len(),
        content_type
    );

    Ok(body.into())
}

/// Decodes raw bytes into an image.
///
/// An empty body, an unrecognised format, or a decode that produces no
/// pixels is a `CorruptImage` failure rather than an empty success.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DownloadError> {
    if bytes.is_empty() {
        return Err(DownloadError::CorruptImage("zero-byte body".to_string()));
    }

    let decoded = image::load_from_memory(bytes)?;
    DecodedImage::new(decoded)
        .ok_or_else(|| DownloadError::CorruptImage("decoded image has no pixels".to_string()))
}

/// Runs `decode_image` on the blocking pool so the caller's task never
/// stalls on CPU-bound work. A panicking decoder is reported as a failure.
pub async fn decode_off_thread(bytes: Vec<u8>) -> Result<DecodedImage, DownloadError> {
    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| DownloadError::Worker(e.to_string()))?
}

/// Reads and decodes an image file previously written by `save_bytes`.
pub async fn decode_file(path: PathBuf) -> Result<DecodedImage, DownloadError> {
    tokio::task::spawn_blocking(move || -> Result<DecodedImage, DownloadError> {
        let bytes = std::fs::read(&path)?;
        decode_image(&bytes)
    })
    .await
    .map_err(|e| DownloadError::Worker(e.to_string()))?
}

/// Writes `bytes` to a fresh, uniquely named file under `dir`.
pub async fn save_bytes(dir: &Path, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(Uuid::new_v4().to_string());
    tokio::fs::write(&path, bytes).await?;

    log::debug!("[save_bytes] wrote {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}
