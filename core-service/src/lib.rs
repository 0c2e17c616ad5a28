//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! settings, audio engine) into the recitation core. Desktop apps typically
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`) and
//! call [`bootstrap_desktop`] with their audio engine factory; mobile hosts
//! build a [`CoreConfig`] with their own adapters and pass it to
//! [`RecitationService::new`].

pub mod error;

pub use error::{CoreError, Result};

pub use core_playback::cache::CacheUsage;
pub use core_playback::{
    format_countdown, ChapterText, OrchestratorState, PlaybackError, Reciter, RECITERS,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventStream};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TokioFileSystem};

use chrono::{DateTime, Utc};
use core_playback::cache::{CacheConfig, CacheStore};
use core_playback::{
    AudioFetcher, AudioIndexResolver, ChapterTextClient, DownloadConfig, Downloader,
    OrchestratorConfig, PlaybackController, PlaybackOrchestrator, ReciterPreference,
    TrackResolver,
};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
///
/// One instance owns one audio session; hosts keep it for the lifetime of the
/// player screen or the app.
pub struct RecitationService {
    orchestrator: Arc<PlaybackOrchestrator>,
    text: Arc<ChapterTextClient>,
    events: EventBus,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl RecitationService {
    /// Assemble the pipeline from `config` and restore the saved reciter.
    #[instrument(skip(config))]
    pub async fn new(config: CoreConfig) -> Result<Self> {
        let events = EventBus::new(config.event_buffer_size);

        let cache_config = CacheConfig::default().with_directory_name(&config.cache_dir_name);
        cache_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;
        let download_config = DownloadConfig::default()
            .with_min_valid_bytes(cache_config.min_valid_bytes)
            .with_max_valid_bytes(cache_config.max_valid_bytes);
        let cache = Arc::new(CacheStore::open(cache_config, config.file_system.clone()).await?);

        let resolver: Arc<dyn TrackResolver> = Arc::new(AudioIndexResolver::new(
            config.http_client.clone(),
            config.catalog.audio_api_base.clone(),
            config.catalog.request_timeout,
        ));
        let downloader = Arc::new(Downloader::new(
            config.http_client.clone(),
            config.file_system.clone(),
            download_config,
        ));
        let fetcher = Arc::new(AudioFetcher::new(
            cache,
            resolver,
            downloader,
            events.clone(),
        ));

        let controller = Arc::new(PlaybackController::new(
            config.audio_engine_factory.clone(),
            config.timings,
        ));
        let text = Arc::new(ChapterTextClient::new(
            config.http_client.clone(),
            config.catalog.text_api_base.clone(),
            config.catalog.translation_code.clone(),
            config.catalog.request_timeout,
        ));

        let orchestrator = Arc::new(PlaybackOrchestrator::new(
            fetcher,
            controller,
            text.clone(),
            ReciterPreference::new(config.settings_store.clone()),
            config.clock.clone(),
            events.clone(),
            OrchestratorConfig::from(&config),
        ));
        let reciter = orchestrator.initialize().await;
        info!(reciter = %reciter, chapters = config.chapter_count, "Recitation service ready");

        Ok(Self {
            orchestrator,
            text,
            events,
            poller: Mutex::new(None),
        })
    }

    pub fn orchestrator(&self) -> &Arc<PlaybackOrchestrator> {
        &self.orchestrator
    }

    /// Subscribe to playback, download and sleep-timer events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn state(&self) -> OrchestratorState {
        self.orchestrator.state()
    }

    pub fn reciters(&self) -> &'static [Reciter] {
        RECITERS
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    pub async fn play_chapter(&self, chapter: u32) -> Result<()> {
        Ok(self.orchestrator.play_chapter(chapter).await?)
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        Ok(self.orchestrator.toggle_play_pause().await?)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.orchestrator.pause().await?)
    }

    pub async fn resume(&self) -> Result<()> {
        Ok(self.orchestrator.resume().await?)
    }

    pub async fn stop(&self) {
        self.orchestrator.stop().await;
    }

    /// Chapter now playing, or `None` when already at the last one.
    pub async fn next(&self) -> Result<Option<u32>> {
        Ok(self.orchestrator.next().await?)
    }

    /// Chapter now playing, or `None` when already at the first one.
    pub async fn previous(&self) -> Result<Option<u32>> {
        Ok(self.orchestrator.previous().await?)
    }

    pub async fn select_chapter(&self, chapter: u32) -> Result<()> {
        Ok(self.orchestrator.select_chapter(chapter).await?)
    }

    pub async fn select_reciter(&self, reciter: &str) {
        self.orchestrator.select_reciter(reciter).await;
    }

    // ------------------------------------------------------------------------
    // Recovery and text
    // ------------------------------------------------------------------------

    pub async fn retry_with_cache_clear(&self) -> Result<()> {
        Ok(self.orchestrator.retry_with_cache_clear().await?)
    }

    pub async fn chapter_text(&self, chapter: u32) -> Result<Arc<ChapterText>> {
        Ok(self.orchestrator.load_text(chapter).await?)
    }

    pub async fn retry_text(&self) -> Result<Arc<ChapterText>> {
        Ok(self.orchestrator.retry_text().await?)
    }

    // ------------------------------------------------------------------------
    // Sleep timer
    // ------------------------------------------------------------------------

    pub fn set_sleep_timer(&self, minutes: i64) -> Result<DateTime<Utc>> {
        Ok(self.orchestrator.set_sleep_timer(minutes)?)
    }

    pub fn cancel_sleep_timer(&self) -> bool {
        self.orchestrator.cancel_sleep_timer()
    }

    pub fn sleep_timer_remaining_secs(&self) -> Option<u64> {
        self.orchestrator.sleep_timer_remaining_secs()
    }

    /// Re-check the sleep deadline, e.g. right after the app returns to the
    /// foreground.
    pub async fn on_resume(&self) -> bool {
        self.orchestrator.sleep_timer().check_expiry().await
    }

    // ------------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------------

    pub async fn cache_usage(&self) -> CacheUsage {
        self.orchestrator.fetcher().cache().usage().await
    }

    /// Release the loaded audio and delete every cached recitation.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<()> {
        self.orchestrator.release_audio().await;
        self.orchestrator.fetcher().cache().clear_all().await?;
        self.text.clear();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Start periodic position updates. Calling again restarts the poller.
    pub fn start_status_updates(&self) {
        let handle = self.orchestrator.spawn_status_poller();
        if let Some(previous) = self.poller.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_status_updates(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
        }
    }

    /// Stop background work and release the audio engine.
    pub async fn shutdown(&self) {
        self.stop_status_updates();
        self.orchestrator.shutdown().await;
        info!("Recitation service shut down");
    }
}

impl Drop for RecitationService {
    fn drop(&mut self) {
        self.stop_status_updates();
    }
}

/// Convenience bootstrapper for desktop hosts: default bridges from
/// `bridge-desktop` plus the host's audio engine.
///
/// ```ignore
/// let service = core_service::bootstrap_desktop(Arc::new(MyEngineFactory)).await?;
/// service.play_chapter(1).await?;
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    audio_engine_factory: Arc<dyn bridge_traits::playback::AudioEngineFactory>,
) -> Result<RecitationService> {
    let config = CoreConfig::builder()
        .audio_engine_factory(audio_engine_factory)
        .build()
        .await?;
    RecitationService::new(config).await
}
