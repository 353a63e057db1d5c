//! Configuration types for article archiving.
//!
//! All run behaviour is controlled through [`ArchiveConfig`], built via its
//! [`ArchiveConfigBuilder`]. The output layout and the image budget live here
//! rather than as defaults inside individual stages, so two runs with the
//! same config produce the same tree.

use crate::error::ArchiveError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Desktop browser User-Agent. Some platforms reject default client agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for archiving one article.
///
/// Built via [`ArchiveConfig::builder()`] or using
/// [`ArchiveConfig::default()`].
///
/// # Example
/// ```rust
/// use article2md::ArchiveConfig;
///
/// let config = ArchiveConfig::builder()
///     .output_dir("archive")
///     .image_budget_bytes(200 * 1024)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ArchiveConfig {
    /// Directory the Markdown file is written to. Default: `output`.
    pub output_dir: PathBuf,

    /// Asset directory, relative to the Markdown file. Default: `images`.
    ///
    /// Image links in the document are relative to the document, so the
    /// archive can be moved as a unit.
    pub image_subdir: String,

    /// Output file stem prefix; the file is `{prefix}_{unix_ts}.md`. Default: `article`.
    pub file_prefix: String,

    /// Target size per stored image in bytes. Default: 300 KiB.
    ///
    /// Best effort: an image that is still larger at `min_quality` is kept
    /// at that quality rather than dropped.
    pub image_budget_bytes: usize,

    /// Maximum width or height after downscaling. Default: 1920.
    pub max_dimension: u32,

    /// First JPEG quality tried. Default: 95.
    pub start_quality: u8,

    /// Quality decrement per iteration. Default: 5.
    pub quality_step: u8,

    /// Lowest JPEG quality tried (inclusive). Default: 10.
    pub min_quality: u8,

    /// Number of images fetched and compressed concurrently. Default: 4.
    pub concurrency: usize,

    /// User-Agent sent with every request.
    pub user_agent: String,

    /// Page fetch timeout in seconds. Default: 30.
    pub page_timeout_secs: u64,

    /// Per-image fetch timeout in seconds. Default: 30.
    pub image_timeout_secs: u64,

    /// Retries on a transient fetch failure (5xx, 429, timeout, transport). Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Replace ASCII punctuation in body text with full-width equivalents. Default: true.
    pub localize_punctuation: bool,

    /// Text shown where an image could not be resolved. Default: None (image disappears).
    pub missing_image_marker: Option<String>,

    /// Include YAML front-matter with document metadata. Default: false.
    pub include_metadata: bool,

    /// Optional progress callback for per-image events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            image_subdir: "images".to_string(),
            file_prefix: "article".to_string(),
            image_budget_bytes: 300 * 1024,
            max_dimension: 1920,
            start_quality: 95,
            quality_step: 5,
            min_quality: 10,
            concurrency: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout_secs: 30,
            image_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            localize_punctuation: true,
            missing_image_marker: None,
            include_metadata: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("output_dir", &self.output_dir)
            .field("image_subdir", &self.image_subdir)
            .field("file_prefix", &self.file_prefix)
            .field("image_budget_bytes", &self.image_budget_bytes)
            .field("max_dimension", &self.max_dimension)
            .field("start_quality", &self.start_quality)
            .field("quality_step", &self.quality_step)
            .field("min_quality", &self.min_quality)
            .field("concurrency", &self.concurrency)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("localize_punctuation", &self.localize_punctuation)
            .field("missing_image_marker", &self.missing_image_marker)
            .field("include_metadata", &self.include_metadata)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ArchiveProgressCallback>"),
            )
            .finish()
    }
}

impl ArchiveConfig {
    /// Create a new builder for `ArchiveConfig`.
    pub fn builder() -> ArchiveConfigBuilder {
        ArchiveConfigBuilder {
            config: Self::default(),
        }
    }

    /// JPEG search parameters derived from this config.
    pub fn compression(&self) -> crate::pipeline::compress::CompressionBudget {
        crate::pipeline::compress::CompressionBudget {
            target_bytes: self.image_budget_bytes,
            max_dimension: self.max_dimension,
            start_quality: self.start_quality,
            quality_step: self.quality_step,
            min_quality: self.min_quality,
        }
    }
}

/// Builder for [`ArchiveConfig`].
#[derive(Debug)]
pub struct ArchiveConfigBuilder {
    config: ArchiveConfig,
}

impl ArchiveConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn image_subdir(mut self, dir: impl Into<String>) -> Self {
        self.config.image_subdir = dir.into();
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    pub fn image_budget_bytes(mut self, bytes: usize) -> Self {
        self.config.image_budget_bytes = bytes;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn start_quality(mut self, q: u8) -> Self {
        self.config.start_quality = q;
        self
    }

    pub fn quality_step(mut self, step: u8) -> Self {
        self.config.quality_step = step;
        self
    }

    pub fn min_quality(mut self, q: u8) -> Self {
        self.config.min_quality = q;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn localize_punctuation(mut self, v: bool) -> Self {
        self.config.localize_punctuation = v;
        self
    }

    pub fn missing_image_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.missing_image_marker = Some(marker.into());
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ArchiveConfig, ArchiveError> {
        let c = &self.config;
        if c.image_budget_bytes == 0 {
            return Err(ArchiveError::InvalidConfig(
                "Image budget must be > 0 bytes".into(),
            ));
        }
        if c.min_quality == 0 || c.min_quality > c.start_quality || c.start_quality > 100 {
            return Err(ArchiveError::InvalidConfig(format!(
                "Quality range must satisfy 1 ≤ min ≤ start ≤ 100, got {}..{}",
                c.min_quality, c.start_quality
            )));
        }
        if c.quality_step == 0 {
            return Err(ArchiveError::InvalidConfig(
                "Quality step must be ≥ 1".into(),
            ));
        }
        if c.max_dimension < 16 {
            return Err(ArchiveError::InvalidConfig(format!(
                "Max dimension must be ≥ 16, got {}",
                c.max_dimension
            )));
        }
        if c.image_subdir.trim().is_empty() {
            return Err(ArchiveError::InvalidConfig(
                "Image subdirectory must not be empty".into(),
            ));
        }
        if c
            .image_subdir
            .chars()
            .any(|ch| ch == '<' || ch == '>' || ch.is_control())
        {
            return Err(ArchiveError::InvalidConfig(format!(
                "Image subdirectory cannot be used in a Markdown link: {:?}",
                c.image_subdir
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ArchiveConfig::default();
        assert_eq!(c.image_budget_bytes, 307_200);
        assert_eq!(c.max_dimension, 1920);
        assert_eq!((c.start_quality, c.quality_step, c.min_quality), (95, 5, 10));
        assert_eq!(c.image_subdir, "images");
        assert!(c.missing_image_marker.is_none());
    }

    #[test]
    fn builder_rejects_inverted_quality_range() {
        let err = ArchiveConfig::builder()
            .start_quality(40)
            .min_quality(60)
            .build()
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_budget() {
        assert!(ArchiveConfig::builder()
            .image_budget_bytes(0)
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_unlinkable_image_subdir() {
        for bad in ["a<b", "img>", "two\nlines", "  "] {
            let err = ArchiveConfig::builder().image_subdir(bad).build().unwrap_err();
            assert!(matches!(err, ArchiveError::InvalidConfig(_)), "{bad:?}");
        }
        assert!(ArchiveConfig::builder()
            .image_subdir("saved pics (2024)")
            .build()
            .is_ok());
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ArchiveConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn compression_budget_mirrors_config() {
        let c = ArchiveConfig::builder()
            .image_budget_bytes(1000)
            .max_dimension(640)
            .build()
            .unwrap();
        let b = c.compression();
        assert_eq!(b.target_bytes, 1000);
        assert_eq!(b.max_dimension, 640);
        assert_eq!(b.start_quality, 95);
    }
}
