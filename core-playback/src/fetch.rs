//! # Audio Fetcher
//!
//! Cache-or-download acquisition of a recitation file.
//!
//! Concurrent requests for the same `(chapter, reciter)` share one resolve and
//! download: the first caller starts it, later callers await the same shared
//! outcome. A download keeps running into the cache even if the caller that
//! started it moves on to another chapter.

use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::download::Downloader;
use crate::error::Result;
use crate::resolver::TrackResolver;

type SharedDownload = Shared<BoxFuture<'static, Result<PathBuf>>>;
type InFlight = Arc<Mutex<HashMap<CacheKey, SharedDownload>>>;

/// Where an acquired file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOrigin {
    Cache,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredAudio {
    pub path: PathBuf,
    pub origin: AudioOrigin,
}

pub struct AudioFetcher {
    cache: Arc<CacheStore>,
    resolver: Arc<dyn TrackResolver>,
    downloader: Arc<Downloader>,
    events: EventBus,
    in_flight: InFlight,
}

impl AudioFetcher {
    pub fn new(
        cache: Arc<CacheStore>,
        resolver: Arc<dyn TrackResolver>,
        downloader: Arc<Downloader>,
        events: EventBus,
    ) -> Self {
        Self {
            cache,
            resolver,
            downloader,
            events,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Path of a valid cached file, if any.
    pub async fn cached_path(&self, chapter: u32, reciter: &str) -> Option<PathBuf> {
        if self.cache.exists(chapter, reciter).await {
            Some(self.cache.path_for(chapter, reciter))
        } else {
            None
        }
    }

    /// Cached file if valid, otherwise resolve and download it.
    pub async fn acquire(&self, chapter: u32, reciter: &str) -> Result<AcquiredAudio> {
        if let Some(path) = self.cached_path(chapter, reciter).await {
            debug!(chapter, reciter, "Cache hit");
            return Ok(AcquiredAudio {
                path,
                origin: AudioOrigin::Cache,
            });
        }
        let path = self.download(chapter, reciter).await?;
        Ok(AcquiredAudio {
            path,
            origin: AudioOrigin::Download,
        })
    }

    /// Resolve and download, joining a transfer already running for the key.
    #[instrument(skip(self))]
    pub async fn download(&self, chapter: u32, reciter: &str) -> Result<PathBuf> {
        let key = CacheKey::new(chapter, reciter);
        let shared = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key) {
                Some(existing) => {
                    info!("Joining in-flight download for {}", key);
                    existing.clone()
                }
                None => {
                    let job = Self::run(
                        self.cache.clone(),
                        self.resolver.clone(),
                        self.downloader.clone(),
                        self.events.clone(),
                        self.in_flight.clone(),
                        key.clone(),
                    )
                    .boxed()
                    .shared();
                    in_flight.insert(key, job.clone());
                    job
                }
            }
        };
        shared.await
    }

    /// Number of distinct keys currently downloading.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn run(
        cache: Arc<CacheStore>,
        resolver: Arc<dyn TrackResolver>,
        downloader: Arc<Downloader>,
        events: EventBus,
        in_flight: InFlight,
        key: CacheKey,
    ) -> Result<PathBuf> {
        let result = Self::resolve_and_download(&cache, &*resolver, &downloader, &events, &key).await;
        in_flight.lock().remove(&key);
        result
    }

    async fn resolve_and_download(
        cache: &CacheStore,
        resolver: &dyn TrackResolver,
        downloader: &Downloader,
        events: &EventBus,
        key: &CacheKey,
    ) -> Result<PathBuf> {
        let url = resolver.resolve_audio_url(key.chapter, &key.reciter).await?;
        let destination = cache.path_for(key.chapter, &key.reciter);

        let _ = events.emit(CoreEvent::Download(DownloadEvent::Started {
            chapter: key.chapter,
            reciter: key.reciter.clone(),
            url: url.clone(),
        }));

        let progress_events = events.clone();
        let progress_key = key.clone();
        let outcome = downloader
            .download(&url, &destination, move |percent| {
                let _ = progress_events.emit(CoreEvent::Download(DownloadEvent::Progress {
                    chapter: progress_key.chapter,
                    reciter: progress_key.reciter.clone(),
                    percent,
                }));
            })
            .await;

        match outcome {
            Ok(path) => {
                let bytes = cache.inspect(key.chapter, &key.reciter).await.size_bytes;
                let _ = events.emit(CoreEvent::Download(DownloadEvent::Completed {
                    chapter: key.chapter,
                    reciter: key.reciter.clone(),
                    bytes,
                }));
                Ok(path)
            }
            Err(e) => {
                warn!("Download for {} failed: {}", key, e);
                let _ = events.emit(CoreEvent::Download(DownloadEvent::Failed {
                    chapter: key.chapter,
                    reciter: key.reciter.clone(),
                    message: e.to_string(),
                }));
                Err(e)
            }
        }
    }
}
