//! Asset storage: where compressed images end up.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A stored asset: where it lives on disk and how the document links to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub path: PathBuf,
    /// Link relative to the Markdown document.
    pub link: String,
}

/// Storage collaborator for compressed images.
///
/// Writing the same `file_name` twice overwrites the first asset.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn write(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<StoredAsset>;
}

/// Stores assets in `<doc_dir>/<subdir>/`, creating it on first write.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
    subdir: String,
}

impl DirAssetStore {
    pub fn new(doc_dir: impl AsRef<Path>, subdir: impl Into<String>) -> Self {
        Self {
            root: doc_dir.as_ref().to_path_buf(),
            subdir: subdir.into(),
        }
    }

    /// Directory the assets are written to.
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.subdir)
    }
}

#[async_trait]
impl AssetStore for DirAssetStore {
    async fn write(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<StoredAsset> {
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored {} ({} bytes)", path.display(), bytes.len());

        Ok(StoredAsset {
            path,
            link: format!("{}/{}", self.subdir.trim_end_matches('/'), file_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_directory_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(tmp.path(), "images");

        let first = store.write("abc.jpg", b"one").await.unwrap();
        assert_eq!(first.link, "images/abc.jpg");
        assert_eq!(first.path, tmp.path().join("images").join("abc.jpg"));

        let second = store.write("abc.jpg", b"two").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(std::fs::read(&first.path).unwrap(), b"two");
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }
}
