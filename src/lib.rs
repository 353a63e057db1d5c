//! # article2md
//!
//! Archive a single published article page as a self-contained Markdown
//! document with locally stored, recompressed images.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch     GET the page (fixed User-Agent, UTF-8)
//!  ├─ 2. Extract   og:* metadata + body, images → placeholder tokens
//!  ├─ 3. Media     per image: fetch → downscale + JPEG quality search → store
//!  ├─ 4. Render    header block, placeholder substitution, text normalisation
//!  └─ 5. Output    Markdown file + images/ next to it
//! ```
//!
//! A page-level failure (fetch, missing title/author, missing body) aborts
//! the run. An image-level failure drops that image and the run continues.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use article2md::{archive_to_file, ArchiveConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArchiveConfig::default();
//!     let output = archive_to_file("https://mp.weixin.qq.com/s/abc", None, &config).await?;
//!     println!("{} → {:?}", output.document.title, output.output_path);
//!     eprintln!("images: {}/{}", output.stats.images_saved, output.stats.images_found);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `article2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod placeholder;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{
    archive, archive_sync, archive_to_file, archive_to_file_with, archive_with,
    default_output_path, write_document,
};
pub use config::{ArchiveConfig, ArchiveConfigBuilder};
pub use document::{ArticleDocument, MediaRef, RawPage};
pub use error::{ArchiveError, FetchError, MediaError};
pub use output::{ArchiveOutput, ArchiveStats, MediaFailure};
pub use pipeline::compress::{compress, CompressionBudget};
pub use pipeline::extract::extract;
pub use pipeline::fetch::{Fetcher, HttpFetcher};
pub use pipeline::media::{MediaResolver, ResolvedMedia};
pub use pipeline::render::{render, RenderOptions};
pub use pipeline::store::{AssetStore, DirAssetStore};
pub use progress::{ArchiveProgressCallback, NoopProgressCallback, ProgressCallback};
