//! Cache store: key to path mapping, validity checks and eviction.

use bridge_traits::storage::FileSystemAccess;
use core_runtime::logging::strip_path;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::config::CacheConfig;
use crate::error::{PlaybackError, Result};

/// Identity of one cached recitation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub chapter: u32,
    pub reciter: String,
}

impl CacheKey {
    pub fn new(chapter: u32, reciter: impl Into<String>) -> Self {
        Self {
            chapter,
            reciter: reciter.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surah {} / {}", self.chapter, self.reciter)
    }
}

/// On-disk view of one key, as observed by [`CacheStore::inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub exists_on_disk: bool,
}

impl CacheEntry {
    pub fn is_valid(&self, config: &CacheConfig) -> bool {
        self.exists_on_disk && config.is_valid_size(self.size_bytes)
    }
}

/// Totals for the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Local store of downloaded recitations.
///
/// Cache checks never fail: I/O errors during [`exists`](Self::exists) and
/// [`delete`](Self::delete) are logged and read as "absent". Only
/// [`clear_all`](Self::clear_all) reports failure.
pub struct CacheStore {
    config: CacheConfig,
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at an explicit directory.
    pub fn new(config: CacheConfig, fs: Arc<dyn FileSystemAccess>, root: PathBuf) -> Result<Self> {
        config.validate().map_err(PlaybackError::CacheConfig)?;
        Ok(Self { config, fs, root })
    }

    /// Create a store under the host cache directory.
    #[instrument(skip(config, fs))]
    pub async fn open(config: CacheConfig, fs: Arc<dyn FileSystemAccess>) -> Result<Self> {
        let base = fs.get_cache_directory().await.map_err(|e| {
            error!("Failed to get cache directory: {}", e);
            PlaybackError::CacheConfig(format!("cache directory unavailable: {}", e))
        })?;
        let root = base.join(&config.directory_name);
        info!("Audio cache at {:?}", root);
        Self::new(config, fs, root)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for a key, e.g. `surah-1-reciter-mishary.mp3`.
    ///
    /// Characters outside `[A-Za-z0-9_-]` in the reciter id are replaced so the
    /// name stays a single path component.
    pub fn file_name(&self, chapter: u32, reciter: &str) -> String {
        let reciter: String = reciter
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "surah-{}-reciter-{}.{}",
            chapter, reciter, self.config.file_extension
        )
    }

    /// Deterministic local path for a key. Performs no I/O.
    pub fn path_for(&self, chapter: u32, reciter: &str) -> PathBuf {
        self.root.join(self.file_name(chapter, reciter))
    }

    /// Whether a valid file exists for the key.
    ///
    /// A file outside the validity range is deleted before `false` is
    /// returned, so a second call observes the same clean state.
    #[instrument(skip(self))]
    pub async fn exists(&self, chapter: u32, reciter: &str) -> bool {
        let entry = self.inspect(chapter, reciter).await;
        if !entry.exists_on_disk {
            return false;
        }
        if entry.is_valid(&self.config) {
            return true;
        }

        let shown = entry.local_path.to_string_lossy();
        warn!(
            size = entry.size_bytes,
            file = strip_path(&shown),
            "Cached file failed size validation, deleting"
        );
        self.remove_file(&entry.local_path).await;
        false
    }

    /// Raw on-disk state for a key, without validation side effects.
    pub async fn inspect(&self, chapter: u32, reciter: &str) -> CacheEntry {
        let key = CacheKey::new(chapter, reciter);
        let local_path = self.path_for(chapter, reciter);

        let (exists_on_disk, size_bytes) = match self.fs.metadata(&local_path).await {
            Ok(meta) if !meta.is_directory => (true, meta.size),
            Ok(_) => (false, 0),
            Err(e) if e.is_not_found() => (false, 0),
            Err(e) => {
                warn!("Failed to stat cached file for {}: {}", key, e);
                (false, 0)
            }
        };

        CacheEntry {
            key,
            local_path,
            size_bytes,
            exists_on_disk,
        }
    }

    /// Remove the file for a key. Succeeds when nothing is there.
    #[instrument(skip(self))]
    pub async fn delete(&self, chapter: u32, reciter: &str) {
        let path = self.path_for(chapter, reciter);
        self.remove_file(&path).await;
    }

    /// Remove the whole cache directory.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        match self.fs.delete_dir_all(&self.root).await {
            Ok(()) => {
                info!("Cleared audio cache");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Audio cache already empty");
                Ok(())
            }
            Err(e) => {
                error!("Failed to clear audio cache: {}", e);
                Err(PlaybackError::CacheClear(e.to_string()))
            }
        }
    }

    /// File count and byte total of the cache directory.
    pub async fn usage(&self) -> CacheUsage {
        let files = match self.fs.list_directory(&self.root).await {
            Ok(files) => files,
            Err(e) => {
                if !e.is_not_found() {
                    warn!("Failed to list audio cache: {}", e);
                }
                return CacheUsage::default();
            }
        };

        let mut usage = CacheUsage::default();
        for path in files {
            match self.fs.metadata(&path).await {
                Ok(meta) if !meta.is_directory => {
                    usage.file_count += 1;
                    usage.total_bytes += meta.size;
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping {:?} in usage: {}", path, e),
            }
        }
        usage
    }

    async fn remove_file(&self, path: &Path) {
        let shown = path.to_string_lossy();
        match self.fs.delete_file(path).await {
            Ok(()) => debug!("Deleted {}", strip_path(&shown)),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!("Failed to delete {}: {}", strip_path(&shown), e),
        }
    }
}
