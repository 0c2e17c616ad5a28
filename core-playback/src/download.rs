//! # Downloader
//!
//! Streams a remote recitation into the cache path with progress reporting.
//!
//! Bytes land in `<destination>.part` first. The partial file is renamed onto
//! the destination only after its size falls inside the validity range, so the
//! cache path never holds a truncated, oversized or error-page download. A partial left by an
//! interrupted transfer is resumed with a `Range` request when the server
//! answers `206`, and restarted otherwise.

use bridge_traits::http::{HttpClient, HttpRequest, HttpStream};
use bridge_traits::storage::FileSystemAccess;
use core_runtime::logging::strip_path;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::config::{DEFAULT_MAX_VALID_BYTES, DEFAULT_MIN_VALID_BYTES};
use crate::error::{PlaybackError, Result};

const CHUNK_SIZE: usize = 64 * 1024;
const PARTIAL_SUFFIX: &str = ".part";

/// Downloader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Completed transfers below this size are rejected (default: 10 KiB)
    pub min_valid_bytes: u64,

    /// Transfers above this size are rejected (default: 50 MiB)
    pub max_valid_bytes: u64,

    /// Continue a leftover `.part` file with a `Range` request (default: true)
    pub resume_partial: bool,

    /// Per-request timeout; `None` leaves it to the HTTP client
    pub request_timeout: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_valid_bytes: DEFAULT_MIN_VALID_BYTES,
            max_valid_bytes: DEFAULT_MAX_VALID_BYTES,
            resume_partial: true,
            request_timeout: None,
        }
    }
}

impl DownloadConfig {
    pub fn with_min_valid_bytes(mut self, bytes: u64) -> Self {
        self.min_valid_bytes = bytes;
        self
    }

    pub fn with_max_valid_bytes(mut self, bytes: u64) -> Self {
        self.max_valid_bytes = bytes;
        self
    }

    pub fn with_resume(mut self, enabled: bool) -> Self {
        self.resume_partial = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// One in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub source_url: String,
    pub destination_path: PathBuf,
    pub bytes_written: u64,
    /// Known once the server sends a length.
    pub bytes_expected: Option<u64>,
}

impl DownloadTask {
    pub fn new(source_url: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
            bytes_written: 0,
            bytes_expected: None,
        }
    }

    /// `round(bytes_written / bytes_expected * 100)`, capped at 100.
    pub fn progress_percent(&self) -> Option<u8> {
        match self.bytes_expected {
            Some(0) | None => None,
            Some(expected) => {
                let percent = (self.bytes_written as f64 / expected as f64 * 100.0).round();
                Some(percent.clamp(0.0, 100.0) as u8)
            }
        }
    }

    /// Path the bytes are streamed into before validation.
    pub fn partial_path(&self) -> PathBuf {
        partial_path_for(&self.destination_path)
    }
}

pub(crate) fn partial_path_for(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Fetches remote audio into local files.
///
/// Does not deduplicate concurrent transfers to the same destination; see
/// [`AudioFetcher`](crate::fetch::AudioFetcher) for that.
pub struct Downloader {
    http: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(
        http: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        config: DownloadConfig,
    ) -> Self {
        Self { http, fs, config }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download `source_url` to `destination`, calling `on_progress` with the
    /// percentage whenever it changes. Returns the destination path.
    #[instrument(skip(self, destination, on_progress), fields(file = tracing::field::Empty))]
    pub async fn download<F>(
        &self,
        source_url: &str,
        destination: &Path,
        mut on_progress: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(u8) + Send,
    {
        let display = destination.to_string_lossy();
        tracing::Span::current().record("file", strip_path(&display));

        if let Some(parent) = destination.parent() {
            self.fs.create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create download directory: {}", e);
                PlaybackError::Download(format!("cannot create directory: {}", e))
            })?;
        }

        let mut task = DownloadTask::new(source_url, destination);
        let partial = task.partial_path();

        let resume_from = self.resume_offset(&partial).await;
        let mut stream = self.open(source_url, resume_from).await?;
        if stream.status == 416 && resume_from > 0 {
            debug!("Server rejected range, restarting download");
            self.discard(&partial).await;
            stream = self.open(source_url, 0).await?;
        }

        if !stream.is_success() {
            let reason = stream.reason.clone().unwrap_or_default();
            error!(
                status = stream.status,
                reason = %reason,
                url = source_url,
                "Download failed with HTTP error"
            );
            return Err(PlaybackError::DownloadHttp {
                status: stream.status,
                reason,
                url: source_url.to_string(),
            });
        }

        let resuming = resume_from > 0 && stream.is_partial();
        if resuming {
            task.bytes_written = resume_from;
            task.bytes_expected = stream.content_length.map(|len| len + resume_from);
        } else {
            task.bytes_expected = stream.content_length;
        }
        if let Some(expected) = task.bytes_expected {
            if expected > self.config.max_valid_bytes {
                return Err(self.reject_too_large(&partial, expected, source_url).await);
            }
        }

        let opened = if resuming {
            info!(offset = resume_from, "Resuming partial download");
            self.fs.open_append_stream(&partial).await
        } else {
            self.fs.open_write_stream(&partial).await
        };
        let mut writer = opened.map_err(|e| {
            PlaybackError::Download(format!("cannot open {}: {}", strip_path(&display), e))
        })?;

        let mut last_percent = task.progress_percent();
        if let Some(percent) = last_percent {
            on_progress(percent);
        }

        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = stream.body.read(&mut buf).await.map_err(|e| {
                warn!(written = task.bytes_written, "Download interrupted: {}", e);
                PlaybackError::Download(format!("{} ({})", e, source_url))
            })?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|e| PlaybackError::Download(format!("write failed: {}", e)))?;
            task.bytes_written += n as u64;
            if task.bytes_written > self.config.max_valid_bytes {
                drop(writer);
                return Err(self
                    .reject_too_large(&partial, task.bytes_written, source_url)
                    .await);
            }

            if let Some(percent) = task.progress_percent() {
                if last_percent != Some(percent) {
                    on_progress(percent);
                    last_percent = Some(percent);
                }
            }
        }

        writer
            .shutdown()
            .await
            .map_err(|e| PlaybackError::Download(format!("flush failed: {}", e)))?;
        drop(writer);

        let size = self
            .fs
            .metadata(&partial)
            .await
            .map_err(|e| PlaybackError::Download(format!("downloaded file missing: {}", e)))?
            .size;

        if let Some(expected) = task.bytes_expected {
            if size < expected {
                warn!(size, expected, "Transfer ended early, keeping partial file");
                return Err(PlaybackError::Download(format!(
                    "incomplete transfer: {} of {} bytes ({})",
                    size, expected, source_url
                )));
            }
        }

        if size < self.config.min_valid_bytes {
            error!(
                size,
                min = self.config.min_valid_bytes,
                url = source_url,
                "Downloaded file is too small"
            );
            self.discard(&partial).await;
            return Err(PlaybackError::DownloadTooSmall {
                size,
                url: source_url.to_string(),
            });
        }

        self.fs.rename(&partial, destination).await.map_err(|e| {
            error!("Failed to move download into cache: {}", e);
            PlaybackError::Download(format!("cannot finalize download: {}", e))
        })?;

        if last_percent != Some(100) {
            on_progress(100);
        }
        info!(size, "Download complete");
        Ok(destination.to_path_buf())
    }

    async fn resume_offset(&self, partial: &Path) -> u64 {
        if !self.config.resume_partial {
            self.discard(partial).await;
            return 0;
        }
        match self.fs.metadata(partial).await {
            Ok(meta) if !meta.is_directory => meta.size,
            _ => 0,
        }
    }

    async fn open(&self, url: &str, offset: u64) -> Result<HttpStream> {
        let mut request = HttpRequest::get(url);
        if offset > 0 {
            request = request.range_from(offset);
        }
        if let Some(timeout) = self.config.request_timeout {
            request = request.timeout(timeout);
        }

        self.http.open_stream(request).await.map_err(|e| {
            error!(url, "Download request failed: {}", e);
            PlaybackError::Download(format!("{} ({})", e, url))
        })
    }

    async fn reject_too_large(&self, partial: &Path, size: u64, url: &str) -> PlaybackError {
        error!(
            size,
            max = self.config.max_valid_bytes,
            url,
            "Download exceeds the valid size range"
        );
        self.discard(partial).await;
        PlaybackError::DownloadTooLarge {
            size,
            url: url.to_string(),
        }
    }

    async fn discard(&self, partial: &Path) {
        match self.fs.delete_file(partial).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!("Failed to remove partial download: {}", e),
        }
    }
}
