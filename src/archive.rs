//! Top-level archiving entry points.
//!
//! A run is: fetch the page, extract the document, resolve every image
//! (concurrently, failures tolerated), render, and optionally write the
//! Markdown file. A page fetch or extraction failure aborts the run before
//! any image is fetched; an image failure drops only that image.

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::output::{ArchiveOutput, ArchiveStats};
use crate::pipeline::fetch::{self, Fetcher, HttpFetcher};
use crate::pipeline::media::MediaResolver;
use crate::pipeline::render::{self, RenderOptions};
use crate::pipeline::store::DirAssetStore;
use crate::pipeline::extract;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Archive an article page.
///
/// Images are stored under `config.output_dir/config.image_subdir`; the
/// Markdown is returned but not written. Use [`archive_to_file`] to write it.
///
/// # Errors
/// Returns `Err(ArchiveError)` only for fatal errors:
/// - invalid URL, page fetch failure or timeout
/// - missing title/author, missing body container
pub async fn archive(
    url: impl AsRef<str>,
    config: &ArchiveConfig,
) -> Result<ArchiveOutput, ArchiveError> {
    let fetcher = http_fetcher(config)?;
    archive_with(fetcher, url.as_ref(), &config.output_dir, config).await
}

/// Archive an article page and write the Markdown file.
///
/// `output_path` defaults to `{output_dir}/{file_prefix}_{unix_ts}.md`.
/// Images are stored in `image_subdir` next to the file. The file is written
/// atomically (temp file + rename), so a failed run leaves no document behind.
pub async fn archive_to_file(
    url: impl AsRef<str>,
    output_path: Option<&Path>,
    config: &ArchiveConfig,
) -> Result<ArchiveOutput, ArchiveError> {
    let fetcher = http_fetcher(config)?;
    archive_to_file_with(fetcher, url.as_ref(), output_path, config).await
}

/// Synchronous wrapper around [`archive_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn archive_sync(
    url: impl AsRef<str>,
    output_path: Option<&Path>,
    config: &ArchiveConfig,
) -> Result<ArchiveOutput, ArchiveError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ArchiveError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(archive_to_file(url, output_path, config))
}

/// [`archive_to_file`] with a caller-supplied [`Fetcher`].
pub async fn archive_to_file_with(
    fetcher: Arc<dyn Fetcher>,
    url: &str,
    output_path: Option<&Path>,
    config: &ArchiveConfig,
) -> Result<ArchiveOutput, ArchiveError> {
    let captured_at = Local::now();
    let path = match output_path {
        Some(p) => p.to_path_buf(),
        None => default_output_path(config, captured_at),
    };
    let doc_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut output = run(fetcher, url, &doc_dir, captured_at, config).await?;
    write_document(&path, &output.markdown).await?;
    info!("Saved {}", path.display());

    output.output_path = Some(path);
    Ok(output)
}

/// [`archive`] with a caller-supplied [`Fetcher`] and document directory.
///
/// Image links in the Markdown are relative to `doc_dir`.
pub async fn archive_with(
    fetcher: Arc<dyn Fetcher>,
    url: &str,
    doc_dir: &Path,
    config: &ArchiveConfig,
) -> Result<ArchiveOutput, ArchiveError> {
    run(fetcher, url, doc_dir, Local::now(), config).await
}

/// `{output_dir}/{file_prefix}_{unix_ts}.md`
pub fn default_output_path(config: &ArchiveConfig, at: DateTime<Local>) -> PathBuf {
    config
        .output_dir
        .join(format!("{}_{}.md", config.file_prefix, at.timestamp()))
}

/// Write `markdown` to `path` atomically, creating parent directories.
pub async fn write_document(path: &Path, markdown: &str) -> Result<(), ArchiveError> {
    let write_err = |source| ArchiveError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn http_fetcher(config: &ArchiveConfig) -> Result<Arc<dyn Fetcher>, ArchiveError> {
    let fetcher = HttpFetcher::new(config)
        .map_err(|e| ArchiveError::Internal(format!("Failed to build HTTP client: {e}")))?;
    Ok(Arc::new(fetcher))
}

async fn run(
    fetcher: Arc<dyn Fetcher>,
    url: &str,
    doc_dir: &Path,
    captured_at: DateTime<Local>,
    config: &ArchiveConfig,
) -> Result<ArchiveOutput, ArchiveError> {
    let total_start = Instant::now();
    if !fetch::is_url(url) || url::Url::parse(url).is_err() {
        return Err(ArchiveError::InvalidUrl {
            input: url.to_string(),
        });
    }
    info!("Archiving {}", url);

    // ── Step 1: Fetch page ───────────────────────────────────────────────
    let fetch_start = Instant::now();
    let page = fetcher
        .fetch_page(url)
        .await
        .map_err(|e| e.into_archive_error(url))?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    debug!(
        "Page fetched in {}ms (declared charset: {:?})",
        fetch_duration_ms, page.encoding
    );

    // ── Step 2: Extract ──────────────────────────────────────────────────
    let document = extract::extract(&page)?;
    info!(
        "Extracted '{}' by {} with {} images",
        document.title,
        document.author,
        document.media_refs.len()
    );

    // ── Step 3: Resolve media ────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_archive_start(document.media_refs.len());
    }
    let media_start = Instant::now();
    let store = Arc::new(DirAssetStore::new(doc_dir, config.image_subdir.clone()));
    let resolver = MediaResolver::new(fetcher, store, config.compression());
    let outcome = resolver
        .resolve_all(
            &document.media_refs,
            config.concurrency,
            config.progress_callback.as_ref(),
        )
        .await;
    let media_duration_ms = media_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_archive_complete(document.media_refs.len(), outcome.resolved.len());
    }

    // ── Step 4: Render ───────────────────────────────────────────────────
    let markdown = render::render(
        &document,
        &outcome.resolved,
        captured_at.naive_local(),
        &RenderOptions::from(config),
    );

    let media: Vec<_> = document
        .media_refs
        .iter()
        .filter_map(|r| outcome.resolved.get(&r.source_url).cloned())
        .collect();

    let stats = ArchiveStats {
        images_found: document.media_refs.len(),
        images_saved: media.len(),
        images_failed: outcome.failures.len(),
        bytes_saved: media.iter().map(|m| m.bytes as u64).sum(),
        fetch_duration_ms,
        media_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Archive complete: {}/{} images, {}ms total",
        stats.images_saved, stats.images_found, stats.total_duration_ms
    );

    Ok(ArchiveOutput {
        markdown,
        document,
        media,
        failures: outcome.failures,
        captured_at: captured_at.naive_local(),
        output_path: None,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_path_uses_prefix_and_unix_time() {
        let config = ArchiveConfig::builder()
            .output_dir("out")
            .file_prefix("weixin_article")
            .build()
            .unwrap();
        let at = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(
            default_output_path(&config, at),
            PathBuf::from("out/weixin_article_1700000000.md")
        );
    }

    #[tokio::test]
    async fn write_document_creates_parents_and_leaves_no_temp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/doc.md");
        write_document(&path, "# hi\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
