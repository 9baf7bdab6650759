use std::fmt;
use std::path::PathBuf;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A single "fetch this image" request. The URL may be empty, in which case
/// the pipeline substitutes its configured default before fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Returns the URL to fetch, falling back to `default_url` when the
    /// request carries an empty string. No other validation is performed.
    pub fn resolve_url(&self, default_url: &str) -> String {
        if self.url.is_empty() {
            default_url.to_string()
        } else {
            self.url.clone()
        }
    }
}

/// A decoded bitmap. Construction guarantees non-zero dimensions and
/// non-empty pixel data.
#[derive(Clone)]
pub struct DecodedImage {
    inner: DynamicImage,
}

impl DecodedImage {
    /// Wraps a decoded image, rejecting anything without pixels.
    pub fn new(inner: DynamicImage) -> Option<Self> {
        if inner.width() == 0 || inner.height() == 0 || inner.as_bytes().is_empty() {
            return None;
        }
        Some(Self { inner })
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// Raw pixel bytes in the image's native color layout.
    pub fn pixels(&self) -> &[u8] {
        self.inner.as_bytes()
    }

}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.inner.color())
            .finish()
    }
}

/// Public failure taxonomy surfaced to sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkError,
    CorruptImage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NetworkError => f.write_str("network error"),
            ErrorKind::CorruptImage => f.write_str("corrupt image"),
        }
    }
}

/// The single terminal event a sink receives per request.
#[derive(Debug, Clone)]
pub enum DownloadResult {
    Success { image: DecodedImage },
    Failure { reason: ErrorKind, detail: String },
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadResult::Success { .. })
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            DownloadResult::Success { .. } => Outcome::Success,
            DownloadResult::Failure { reason, .. } => Outcome::Failure(*reason),
        }
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        match self {
            DownloadResult::Success { image } => Some(image),
            DownloadResult::Failure { .. } => None,
        }
    }
}

impl From<Result<DecodedImage, DownloadError>> for DownloadResult {
    fn from(result: Result<DecodedImage, DownloadError>) -> Self {
        match result {
            Ok(image) => DownloadResult::Success { image },
            Err(e) => DownloadResult::Failure {
                reason: e.kind(),
                detail: e.to_string(),
            },
        }
    }
}

/// Internal error type. Never crosses the worker boundary; it is folded
/// into a `DownloadResult::Failure` via `kind()`.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("corrupt image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("corrupt image: {0}")]
    CorruptImage(String),

    #[error("disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("worker failed: {0}")]
    Worker(String),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Network(_) | DownloadError::Disk(_) => ErrorKind::NetworkError,
            DownloadError::Decode(_) | DownloadError::CorruptImage(_) | DownloadError::Worker(_) => {
                ErrorKind::CorruptImage
            }
        }
    }
}

/// Terminal outcome recorded in `RequestState::Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(ErrorKind),
}

/// Per-request lifecycle: `Pending -> Fetching -> Decoding -> Delivered`.
/// A fetch failure may jump straight from `Fetching` to `Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Fetching,
    Decoding,
    Delivered(Outcome),
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Delivered(_))
    }

    pub fn can_transition_to(&self, next: &RequestState) -> bool {
        match (self, next) {
            (RequestState::Pending, RequestState::Fetching) => true,
            (RequestState::Fetching, RequestState::Decoding) => true,
            (RequestState::Fetching, RequestState::Delivered(Outcome::Failure(_))) => true,
            (RequestState::Decoding, RequestState::Delivered(_)) => true,
            _ => false,
        }
    }
}

/// Reply posted by `DownloadService` once the image file is on disk
/// (or the attempt failed).
#[derive(Debug)]
pub struct ServiceReply {
    pub request_id: String,
    pub url: String,
    pub outcome: Result<PathBuf, DownloadError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_resolves_to_default() {
        let req = DownloadRequest::new("");
        assert_eq!(req.resolve_url("http://default/img.png"), "http://default/img.png");
    }

    #[test]
    fn non_empty_url_is_kept_verbatim() {
        let req = DownloadRequest::new("not a url");
        assert_eq!(req.resolve_url("http://default/img.png"), "not a url");
    }

    #[test]
    fn state_machine_follows_happy_path() {
        let path = [
            RequestState::Pending,
            RequestState::Fetching,
            RequestState::Decoding,
            RequestState::Delivered(Outcome::Success),
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn fetch_failure_skips_decoding() {
        let failed = RequestState::Delivered(Outcome::Failure(ErrorKind::NetworkError));
        assert!(RequestState::Fetching.can_transition_to(&failed));
        assert!(!RequestState::Fetching.can_transition_to(&RequestState::Delivered(Outcome::Success)));
    }

    #[test]
    fn delivered_is_final() {
        let done = RequestState::Delivered(Outcome::Success);
        assert!(done.is_terminal());
        for next in [
            RequestState::Pending,
            RequestState::Fetching,
            RequestState::Decoding,
            RequestState::Delivered(Outcome::Failure(ErrorKind::CorruptImage)),
        ] {
            assert!(!done.can_transition_to(&next));
        }
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(DecodedImage::new(DynamicImage::new_rgb8(0, 0)).is_none());
        let img = DecodedImage::new(DynamicImage::new_rgb8(2, 3)).unwrap();
        assert_eq!((img.width(), img.height()), (2, 3));
        assert_eq!(img.pixels().len(), 2 * 3 * 3);
    }

    #[test]
    fn error_classification() {
        let io = DownloadError::Disk(std::io::Error::other("disk full"));
        assert_eq!(io.kind(), ErrorKind::NetworkError);
        assert_eq!(DownloadError::CorruptImage("empty".into()).kind(), ErrorKind::CorruptImage);
        assert_eq!(DownloadError::Worker("panic".into()).kind(), ErrorKind::CorruptImage);
    }

    #[test]
    fn failure_result_carries_kind_and_detail() {
        let result = DownloadResult::from(Err::<DecodedImage, _>(DownloadError::CorruptImage("zero-byte body".into())));
        match result {
            DownloadResult::Failure { reason, detail } => {
                assert_eq!(reason, ErrorKind::CorruptImage);
                assert!(detail.contains("zero-byte body"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
