//! Media resolution: source URL → fetched, recompressed, stored image.
//!
//! Each reference is resolved independently: fetch the bytes, compress them
//! off the async executor, store them under a name derived from the source
//! URL. A failure at any step drops only that image.
//!
//! ## Why hash the URL, not the bytes?
//!
//! The asset name must be known to be stable across re-runs without having
//! to download first. MD5 of the source URL gives the same file name every
//! time the same article is archived, so re-runs overwrite instead of
//! accumulating duplicates.

use crate::document::MediaRef;
use crate::error::MediaError;
use crate::output::MediaFailure;
use crate::pipeline::compress::{self, CompressError, CompressionBudget};
use crate::pipeline::fetch::Fetcher;
use crate::pipeline::store::AssetStore;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// One successfully stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub source_url: String,
    /// Hex MD5 of `source_url`.
    pub local_id: String,
    /// Markdown substituted for the image's placeholder.
    pub rendered_snippet: String,
    pub path: PathBuf,
    pub bytes: usize,
    pub quality: u8,
}

/// Outcome of resolving every reference of a document.
#[derive(Debug, Default)]
pub struct MediaOutcome {
    pub resolved: HashMap<String, ResolvedMedia>,
    /// In document order.
    pub failures: Vec<MediaFailure>,
}

/// Deterministic asset identifier for a source URL.
pub fn local_id(source_url: &str) -> String {
    format!("{:x}", md5::compute(source_url.as_bytes()))
}

/// Markdown image link for a stored asset.
///
/// Links containing whitespace or parentheses use the `<...>` destination
/// form so the link stays intact.
pub fn render_snippet(alt_text: &str, link: &str) -> String {
    let needs_brackets = link
        .chars()
        .any(|c| c.is_whitespace() || c == '(' || c == ')');
    if needs_brackets {
        format!("![{}](<{}>)", escape_alt(alt_text), link)
    } else {
        format!("![{}]({})", escape_alt(alt_text), link)
    }
}

fn escape_alt(alt: &str) -> String {
    let mut out = String::with_capacity(alt.len());
    for c in alt.chars() {
        match c {
            '[' | ']' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Fetches, compresses and stores images.
#[derive(Clone)]
pub struct MediaResolver {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn AssetStore>,
    budget: CompressionBudget,
}

impl MediaResolver {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn AssetStore>,
        budget: CompressionBudget,
    ) -> Self {
        Self {
            fetcher,
            store,
            budget,
        }
    }

    /// Resolve a single image. Writes one asset on success, nothing on failure.
    pub async fn resolve(
        &self,
        source_url: &str,
        alt_text: &str,
    ) -> Result<ResolvedMedia, MediaError> {
        let raw = self
            .fetcher
            .fetch_image(source_url)
            .await
            .map_err(|e| MediaError::FetchFailed {
                url: source_url.to_string(),
                reason: e.to_string(),
            })?;

        let budget = self.budget;
        let compressed = tokio::task::spawn_blocking(move || compress::compress(&raw, &budget))
            .await
            .map_err(|e| MediaError::EncodeFailed {
                url: source_url.to_string(),
                detail: format!("compression task panicked: {e}"),
            })?
            .map_err(|e| match e {
                CompressError::Decode(e) => MediaError::DecodeError {
                    url: source_url.to_string(),
                    detail: e.to_string(),
                },
                CompressError::Encode(e) => MediaError::EncodeFailed {
                    url: source_url.to_string(),
                    detail: e.to_string(),
                },
            })?;

        if !compressed.within_budget {
            debug!(
                "{} still {} bytes at floor quality {}",
                source_url,
                compressed.bytes.len(),
                compressed.quality
            );
        }

        let local_id = local_id(source_url);
        let stored = self
            .store
            .write(&format!("{local_id}.jpg"), &compressed.bytes)
            .await
            .map_err(|e| MediaError::WriteFailed {
                url: source_url.to_string(),
                detail: e.to_string(),
            })?;

        Ok(ResolvedMedia {
            source_url: source_url.to_string(),
            local_id,
            rendered_snippet: render_snippet(alt_text, &stored.link),
            path: stored.path,
            bytes: compressed.bytes.len(),
            quality: compressed.quality,
        })
    }

    /// Resolve every reference with up to `concurrency` in flight.
    ///
    /// Never fails as a whole; per-image failures are collected.
    pub async fn resolve_all(
        &self,
        refs: &[MediaRef],
        concurrency: usize,
        progress: Option<&ProgressCallback>,
    ) -> MediaOutcome {
        let total = refs.len();
        let results: Vec<(usize, Result<ResolvedMedia, MediaError>)> =
            stream::iter(refs.iter().enumerate().map(|(i, r)| async move {
                let index = i + 1;
                if let Some(cb) = progress {
                    cb.on_media_start(index, total);
                }
                let result = self.resolve(&r.source_url, &r.alt_text).await;
                if let Some(cb) = progress {
                    match &result {
                        Ok(m) => cb.on_media_complete(index, total, m.bytes),
                        Err(e) => cb.on_media_error(index, total, e.to_string()),
                    }
                }
                (i, result)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut outcome = MediaOutcome::default();
        let mut failures: Vec<(usize, MediaFailure)> = Vec::new();
        for (i, result) in results {
            match result {
                Ok(media) => {
                    outcome.resolved.insert(media.source_url.clone(), media);
                }
                Err(error) => {
                    warn!("Dropping image {}/{}: {}", i + 1, total, error);
                    failures.push((
                        i,
                        MediaFailure {
                            source_url: error.url().to_string(),
                            error,
                        },
                    ));
                }
            }
        }
        failures.sort_by_key(|(i, _)| *i);
        outcome.failures = failures.into_iter().map(|(_, f)| f).collect();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RawPage;
    use crate::error::FetchError;
    use crate::pipeline::store::DirAssetStore;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct MapFetcher(HashMap<String, Result<Vec<u8>, FetchError>>);

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch_page(&self, _url: &str) -> Result<RawPage, FetchError> {
            Err(FetchError::Status { status: 404 })
        }

        async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.0
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status { status: 404 }))
        }
    }

    fn png() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([9, 9, 9])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn resolver(
        dir: &std::path::Path,
        images: Vec<(&str, Result<Vec<u8>, FetchError>)>,
    ) -> MediaResolver {
        let map = images
            .into_iter()
            .map(|(u, r)| (u.to_string(), r))
            .collect();
        MediaResolver::new(
            Arc::new(MapFetcher(map)),
            Arc::new(DirAssetStore::new(dir, "images")),
            CompressionBudget::default(),
        )
    }

    #[test]
    fn local_id_is_md5_of_url() {
        assert_eq!(local_id(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(local_id("https://a/x.png"), local_id("https://a/x.png"));
        assert_ne!(local_id("https://a/x.png"), local_id("https://a/y.png"));
    }

    #[test]
    fn snippet_escapes_alt() {
        assert_eq!(
            render_snippet("a [b]\nc", "images/x.jpg"),
            r"![a \[b\] c](images/x.jpg)"
        );
    }

    #[test]
    fn snippet_brackets_links_with_spaces_or_parens() {
        assert_eq!(
            render_snippet("", "my images/x.jpg"),
            "![](<my images/x.jpg>)"
        );
        assert_eq!(render_snippet("p", "img(1)/x.jpg"), "![p](<img(1)/x.jpg>)");
    }

    #[tokio::test]
    async fn stored_link_with_spaces_renders_bracketed() {
        let tmp = tempfile::tempdir().unwrap();
        let r = MediaResolver::new(
            Arc::new(MapFetcher(HashMap::from([(
                "https://img/a.png".to_string(),
                Ok(png()),
            )]))),
            Arc::new(DirAssetStore::new(tmp.path(), "saved pics")),
            CompressionBudget::default(),
        );
        let media = r.resolve("https://img/a.png", "").await.unwrap();
        assert_eq!(
            media.rendered_snippet,
            format!("![](<saved pics/{}.jpg>)", local_id("https://img/a.png"))
        );
        assert!(tmp.path().join("saved pics").join(format!("{}.jpg", media.local_id)).exists());
    }

    #[tokio::test]
    async fn same_url_same_id_regardless_of_alt() {
        let tmp = tempfile::tempdir().unwrap();
        let r = resolver(tmp.path(), vec![("https://img/a.png", Ok(png()))]);

        let one = r.resolve("https://img/a.png", "first").await.unwrap();
        let two = r.resolve("https://img/a.png", "second").await.unwrap();
        assert_eq!(one.local_id, two.local_id);
        assert_eq!(one.path, two.path);
        assert!(one.rendered_snippet.starts_with("![first](images/"));
        assert!(two.rendered_snippet.starts_with("![second](images/"));
        assert_eq!(std::fs::read_dir(tmp.path().join("images")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let r = resolver(
            tmp.path(),
            vec![("https://img/a.png", Err(FetchError::Status { status: 500 }))],
        );
        let err = r.resolve("https://img/a.png", "").await.unwrap_err();
        assert!(matches!(err, MediaError::FetchFailed { .. }));
        assert!(!tmp.path().join("images").exists());
    }

    #[tokio::test]
    async fn undecodable_bytes_are_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let r = resolver(tmp.path(), vec![("https://img/a.png", Ok(b"nope".to_vec()))]);
        let err = r.resolve("https://img/a.png", "").await.unwrap_err();
        assert!(matches!(err, MediaError::DecodeError { .. }));
    }

    #[tokio::test]
    async fn resolve_all_collects_failures_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let r = resolver(
            tmp.path(),
            vec![
                ("u1", Ok(png())),
                ("u2", Err(FetchError::Timeout { secs: 1 })),
                ("u3", Ok(png())),
                ("u4", Ok(b"junk".to_vec())),
            ],
        );
        let refs: Vec<MediaRef> = ["u1", "u2", "u3", "u4"]
            .iter()
            .map(|u| MediaRef {
                source_url: u.to_string(),
                alt_text: String::new(),
            })
            .collect();

        let outcome = r.resolve_all(&refs, 3, None).await;
        let mut ok: Vec<&str> = outcome.resolved.keys().map(String::as_str).collect();
        ok.sort_unstable();
        assert_eq!(ok, vec!["u1", "u3"]);
        let failed: Vec<&str> = outcome
            .failures
            .iter()
            .map(|f| f.source_url.as_str())
            .collect();
        assert_eq!(failed, vec!["u2", "u4"]);
    }
}
