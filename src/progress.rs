//! Progress-callback trait for per-image archiving events.
//!
//! Inject an [`Arc<dyn ArchiveProgressCallback>`] via
//! [`crate::config::ArchiveConfigBuilder::progress_callback`] to receive
//! events as the pipeline fetches and compresses each image.
//!
//! # Example
//!
//! ```rust
//! use article2md::{ArchiveProgressCallback, ArchiveConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: Arc<AtomicUsize>,
//! }
//!
//! impl ArchiveProgressCallback for CountingCallback {
//!     fn on_media_complete(&self, index: usize, total: usize, bytes: usize) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {}/{} stored ({} bytes)", index, total, bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     saved: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ArchiveConfig::builder()
//!     .progress_callback(counter as Arc<dyn ArchiveProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it resolves each image.
///
/// Implementations must be `Send + Sync`: images are resolved concurrently,
/// so `on_media_*` may be called from several tasks at once. All methods
/// have default no-op implementations.
pub trait ArchiveProgressCallback: Send + Sync {
    /// Called once after extraction, before any image is fetched.
    fn on_archive_start(&self, image_count: usize) {
        let _ = image_count;
    }

    /// Called just before an image is fetched. `index` is 1-based document order.
    fn on_media_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when an image has been compressed and stored.
    ///
    /// * `bytes` — size of the stored JPEG
    fn on_media_complete(&self, index: usize, total: usize, bytes: usize) {
        let _ = (index, total, bytes);
    }

    /// Called when an image is dropped.
    ///
    /// Takes an owned `String` so implementations can move it across tasks.
    fn on_media_error(&self, index: usize, total: usize, error: String) {
        let _ = (index, total, error);
    }

    /// Called once after every image has been attempted.
    fn on_archive_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ArchiveProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ArchiveConfig`].
pub type ProgressCallback = Arc<dyn ArchiveProgressCallback>;
