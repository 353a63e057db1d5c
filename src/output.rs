//! Result types returned by the top-level archiving functions.

use crate::document::ArticleDocument;
use crate::error::MediaError;
use crate::pipeline::media::ResolvedMedia;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything produced by one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveOutput {
    /// The final Markdown document.
    pub markdown: String,
    pub document: ArticleDocument,
    /// Stored images, in document order.
    pub media: Vec<ResolvedMedia>,
    /// Images that were dropped, in document order.
    pub failures: Vec<MediaFailure>,
    pub captured_at: NaiveDateTime,
    /// Where the Markdown was written, when written by [`crate::archive_to_file`].
    pub output_path: Option<PathBuf>,
    pub stats: ArchiveStats,
}

/// A dropped image and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFailure {
    pub source_url: String,
    pub error: MediaError,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub images_found: usize,
    pub images_saved: usize,
    pub images_failed: usize,
    /// Total size of stored images.
    pub bytes_saved: u64,
    pub fetch_duration_ms: u64,
    pub media_duration_ms: u64,
    pub total_duration_ms: u64,
}
