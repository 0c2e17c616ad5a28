//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWrite;
use tracing::debug;

const APP_DIR: &str = "tilawa";

/// Tokio-based file system implementation
///
/// Downloaded audio lives under the platform cache directory, settings under
/// the platform data directory, both in an application subfolder.
pub struct TokioFileSystem {
    cache_dir: PathBuf,
    data_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor with default directories
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join(APP_DIR);

        Self { cache_dir, data_dir }
    }

    /// Create a new file system accessor with custom directories
    pub fn with_directories(cache_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self { cache_dir, data_dir }
    }

    async fn ensure_dir(path: &Path) -> Result<()> {
        if !fs::try_exists(path).await? {
            fs::create_dir_all(path).await?;
            debug!(path = ?path, "Created directory");
        }
        Ok(())
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::ensure_dir(parent).await,
            _ => Ok(()),
        }
    }

    fn unix_secs(time: std::io::Result<SystemTime>) -> Option<i64> {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Self::ensure_dir(&self.cache_dir).await?;
        Ok(self.cache_dir.clone())
    }

    async fn get_data_directory(&self) -> Result<PathBuf> {
        Self::ensure_dir(&self.data_dir).await?;
        Ok(self.data_dir.clone())
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await?;

        Ok(FileMetadata {
            size: metadata.len(),
            created_at: Self::unix_secs(metadata.created()),
            modified_at: Self::unix_secs(metadata.modified()),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        Self::ensure_parent(path).await?;
        fs::write(path, data.as_ref()).await?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).await?;
        debug!(path = ?path, "Deleted directory");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        Self::ensure_parent(to).await?;
        fs::rename(from, to).await?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn open_write_stream(&self, path: &Path) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        Self::ensure_parent(path).await?;
        let file = fs::File::create(path).await?;
        debug!(path = ?path, "Opened file for writing");
        Ok(Box::new(file))
    }

    async fn open_append_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        Self::ensure_parent(path).await?;
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        debug!(path = ?path, "Opened file for appending");
        Ok(Box::new(file))
    }
}
