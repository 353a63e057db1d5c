//! Error types for the article2md library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ArchiveError`] — **Fatal**: the run cannot produce a document at all
//!   (page fetch failed, a required metadata field is missing, the body
//!   container is absent, the final write failed). Returned as
//!   `Err(ArchiveError)` from the top-level `archive*` functions.
//!
//! * [`MediaError`] — **Non-fatal**: a single image could not be fetched,
//!   decoded or stored. The image is dropped from the output and the failure
//!   is recorded in [`crate::output::ArchiveOutput::failures`].
//!
//! * [`FetchError`] — what a [`crate::pipeline::fetch::Fetcher`] reports.
//!   Mapped into one of the two above depending on which resource failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the article2md library.
#[derive(Debug, Error)]
pub enum ArchiveError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The article page could not be fetched.
    #[error("Failed to fetch '{url}': {reason}\nCheck the URL and your internet connection.")]
    FetchFailed { url: String, reason: String },

    /// The article page fetch exceeded the configured timeout.
    #[error("Fetching '{url}' timed out after {secs}s\nIncrease --page-timeout.")]
    FetchTimeout { url: String, secs: u64 },

    /// The input string is not an absolute HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a valid HTTP/HTTPS URL")]
    InvalidUrl { input: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A required metadata field is absent from the page.
    #[error("Required field '{field}' is missing from the page")]
    MissingField { field: &'static str },

    /// The article body container was not found.
    #[error("Article content not found (no element matching '{marker}')")]
    ContentNotFound { marker: &'static str },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// The run continues; the image's placeholder is substituted with an empty
/// string (or the configured marker).
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum MediaError {
    /// Image fetch returned a non-success status or a transport error.
    #[error("Image '{url}': fetch failed: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Image bytes could not be decoded.
    #[error("Image '{url}': not a decodable image: {detail}")]
    DecodeError { url: String, detail: String },

    /// Re-encoding to JPEG failed.
    #[error("Image '{url}': encoding failed: {detail}")]
    EncodeFailed { url: String, detail: String },

    /// The compressed asset could not be stored.
    #[error("Image '{url}': write failed: {detail}")]
    WriteFailed { url: String, detail: String },
}

impl MediaError {
    /// The source URL of the image that failed.
    pub fn url(&self) -> &str {
        match self {
            MediaError::FetchFailed { url, .. }
            | MediaError::DecodeError { url, .. }
            | MediaError::EncodeFailed { url, .. }
            | MediaError::WriteFailed { url, .. } => url,
        }
    }
}

/// Failure reported by a fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// The request did not complete within the timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection, TLS or body-read failure.
    #[error("{0}")]
    Transport(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Server errors, throttling and network-level failures are retried;
    /// other HTTP statuses (404, 403, …) are final.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status } => *status >= 500 || *status == 429,
            FetchError::Timeout { .. } | FetchError::Transport(_) => true,
        }
    }

    pub(crate) fn into_archive_error(self, url: &str) -> ArchiveError {
        match self {
            FetchError::Timeout { secs } => ArchiveError::FetchTimeout {
                url: url.to_string(),
                secs,
            },
            other => ArchiveError::FetchFailed {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
