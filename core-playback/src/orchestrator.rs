//! # Playback Orchestrator
//!
//! Maps user intents (play, pause, next, previous, reciter change, retry) onto
//! the acquisition pipeline and the controller:
//!
//! 1. cache check
//! 2. on a miss, resolve the URL and download into the cache path
//! 3. load the local file, then play
//!
//! Any failure rolls the loaded, downloading and playing flags back before the
//! error is reported, so a retry starts clean.
//!
//! Each play request gets a sequence number. Starting a new request makes the
//! older one stale: its download still completes into the cache, but it will
//! not touch the controller or the flags afterwards and returns
//! [`PlaybackError::LoadSuperseded`]. Controller steps of all requests are
//! serialized through one intent lock.

use async_trait::async_trait;
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_runtime::config::{CoreConfig, DEFAULT_CHAPTER_COUNT};
use core_runtime::events::{CoreEvent, ErrorKind, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{ChapterText, ChapterTextClient};
use crate::controller::PlaybackController;
use crate::error::{PlaybackError, Result};
use crate::fetch::AudioFetcher;
use crate::preferences::ReciterPreference;
use crate::reciters::DEFAULT_RECITER_ID;
use crate::sleep_timer::{SleepAction, SleepTimer};

/// Pause between stopping audible playback and starting the next load.
pub const DEFAULT_TRANSITION_SETTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Highest chapter number; chapters run `1..=chapter_count`.
    pub chapter_count: u32,
    pub status_poll_interval: Duration,
    pub sleep_tick_interval: Duration,
    pub transition_settle: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chapter_count: DEFAULT_CHAPTER_COUNT,
            status_poll_interval: Duration::from_secs(1),
            sleep_tick_interval: Duration::from_secs(1),
            transition_settle: DEFAULT_TRANSITION_SETTLE,
        }
    }
}

impl From<&CoreConfig> for OrchestratorConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            chapter_count: config.chapter_count,
            status_poll_interval: config.timings.status_poll_interval,
            sleep_tick_interval: config.timings.sleep_tick_interval,
            transition_settle: DEFAULT_TRANSITION_SETTLE,
        }
    }
}

/// What the host renders: current selection plus pipeline flags.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorState {
    pub chapter: u32,
    pub reciter: String,
    /// Chapter whose audio is bound to the controller.
    pub loaded_chapter: Option<u32>,
    pub is_loaded: bool,
    pub is_downloading: bool,
    pub is_playing: bool,
    pub last_error: Option<PlaybackError>,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self {
            chapter: 1,
            reciter: DEFAULT_RECITER_ID.to_string(),
            loaded_chapter: None,
            is_loaded: false,
            is_downloading: false,
            is_playing: false,
            last_error: None,
        }
    }
}

impl OrchestratorState {
    fn clear_audio(&mut self) {
        self.loaded_chapter = None;
        self.is_loaded = false;
        self.is_downloading = false;
        self.is_playing = false;
    }
}

type SharedState = Arc<Mutex<OrchestratorState>>;

/// Sleep expiry: stop the controller and drop the playing flag.
struct StopOnSleep {
    controller: Arc<PlaybackController>,
    state: SharedState,
    events: EventBus,
}

#[async_trait]
impl SleepAction for StopOnSleep {
    async fn on_sleep_timer_expired(&self) {
        self.controller.stop().await;
        let chapter = {
            let mut state = self.state.lock();
            state.is_playing = false;
            state.loaded_chapter
        };
        let _ = self
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Stopped { chapter }));
    }
}

pub struct PlaybackOrchestrator {
    fetcher: Arc<AudioFetcher>,
    controller: Arc<PlaybackController>,
    text: Arc<ChapterTextClient>,
    preference: ReciterPreference,
    sleep_timer: SleepTimer,
    events: EventBus,
    config: OrchestratorConfig,
    state: SharedState,
    sequence: AtomicU64,
    intents: tokio::sync::Mutex<()>,
}

impl PlaybackOrchestrator {
    pub fn new(
        fetcher: Arc<AudioFetcher>,
        controller: Arc<PlaybackController>,
        text: Arc<ChapterTextClient>,
        preference: ReciterPreference,
        clock: Arc<dyn Clock>,
        events: EventBus,
        config: OrchestratorConfig,
    ) -> Self {
        let state: SharedState = Arc::new(Mutex::new(OrchestratorState::default()));
        let sleep_timer = SleepTimer::new(
            clock,
            Arc::new(StopOnSleep {
                controller: controller.clone(),
                state: state.clone(),
                events: events.clone(),
            }),
            events.clone(),
            config.sleep_tick_interval,
        );

        Self {
            fetcher,
            controller,
            text,
            preference,
            sleep_timer,
            events,
            config,
            state,
            sequence: AtomicU64::new(0),
            intents: tokio::sync::Mutex::new(()),
        }
    }

    /// Restore the persisted reciter. Call once at startup.
    pub async fn initialize(&self) -> String {
        let reciter = self.preference.load().await;
        self.state.lock().reciter = reciter.clone();
        info!(reciter = %reciter, "Playback orchestrator ready");
        reciter
    }

    pub fn state(&self) -> OrchestratorState {
        self.state.lock().clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn fetcher(&self) -> &Arc<AudioFetcher> {
        &self.fetcher
    }

    pub fn sleep_timer(&self) -> &SleepTimer {
        &self.sleep_timer
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ========================================================================
    // Transport intents
    // ========================================================================

    /// Acquire, load and play `chapter` with the selected reciter.
    #[instrument(skip(self))]
    pub async fn play_chapter(&self, chapter: u32) -> Result<()> {
        self.check_bounds(chapter)?;
        self.run_sequence(chapter).await
    }

    /// Pause when playing, resume when the current chapter is loaded,
    /// otherwise start the current chapter.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let state = self.state();
        if state.is_playing {
            self.pause().await
        } else if state.is_loaded && state.loaded_chapter == Some(state.chapter) {
            self.resume().await
        } else {
            self.play_chapter(state.chapter).await
        }
    }

    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let _intent = self.intents.lock().await;
        self.controller.pause().await?;

        let chapter = {
            let mut state = self.state.lock();
            state.is_playing = false;
            state.loaded_chapter
        };
        if let Some(chapter) = chapter {
            let position_ms = self
                .controller
                .status()
                .await
                .map_or(0, |status| status.position.as_millis() as u64);
            let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Paused {
                chapter,
                position_ms,
            }));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<()> {
        let _intent = self.intents.lock().await;
        let (chapter, reciter) = {
            let state = self.state.lock();
            (state.loaded_chapter, state.reciter.clone())
        };
        let Some(chapter) = chapter else {
            return Err(PlaybackError::NoAudioLoaded);
        };

        match self.controller.play().await {
            Ok(()) => {
                self.state.lock().is_playing = true;
                let _ = self
                    .events
                    .emit(CoreEvent::Playback(PlaybackEvent::Started { chapter, reciter }));
                Ok(())
            }
            Err(e) => {
                self.fail(chapter, &e).await;
                Err(e)
            }
        }
    }

    /// Stop playback. Never fails.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let _intent = self.intents.lock().await;
        self.stop_locked().await;
    }

    /// Stop, then play the next chapter. `None` at the last chapter.
    pub async fn next(&self) -> Result<Option<u32>> {
        let current = self.state.lock().chapter;
        if current >= self.config.chapter_count {
            debug!("Already at the last chapter");
            return Ok(None);
        }
        self.navigate(current + 1).await
    }

    /// Stop, then play the previous chapter. `None` at the first chapter.
    pub async fn previous(&self) -> Result<Option<u32>> {
        let current = self.state.lock().chapter;
        if current <= 1 {
            debug!("Already at the first chapter");
            return Ok(None);
        }
        self.navigate(current - 1).await
    }

    /// Make `chapter` current. Playback continues into it when audio was
    /// playing; otherwise audio is stopped and the chapter waits for `play`.
    #[instrument(skip(self))]
    pub async fn select_chapter(&self, chapter: u32) -> Result<()> {
        self.check_bounds(chapter)?;
        let (current, was_playing) = {
            let state = self.state.lock();
            (state.chapter, state.is_playing)
        };
        if current == chapter {
            return Ok(());
        }
        if was_playing {
            return self.run_sequence(chapter).await;
        }

        let _intent = self.intents.lock().await;
        self.claim_sequence();
        self.controller.stop().await;
        let mut state = self.state.lock();
        state.chapter = chapter;
        state.last_error = None;
        if state.loaded_chapter != Some(chapter) {
            state.clear_audio();
        }
        Ok(())
    }

    /// Persist a new reciter and stop current audio so the next play
    /// acquires the new recitation.
    #[instrument(skip(self))]
    pub async fn select_reciter(&self, reciter: &str) {
        if self.state.lock().reciter == reciter {
            return;
        }
        self.preference.save(reciter).await;

        let _intent = self.intents.lock().await;
        self.claim_sequence();
        self.stop_locked().await;
        let mut state = self.state.lock();
        state.reciter = reciter.to_string();
        state.clear_audio();
        state.last_error = None;
        info!("Reciter changed");
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Delete the cached file for the current key and play again.
    #[instrument(skip(self))]
    pub async fn retry_with_cache_clear(&self) -> Result<()> {
        let (chapter, reciter) = {
            let state = self.state.lock();
            (state.chapter, state.reciter.clone())
        };
        {
            let _intent = self.intents.lock().await;
            self.claim_sequence();
            self.controller.unload().await;
            self.state.lock().clear_audio();
        }
        self.fetcher.cache().delete(chapter, &reciter).await;
        self.run_sequence(chapter).await
    }

    /// Fetch the current chapter's text again, bypassing the memoised copy.
    #[instrument(skip(self))]
    pub async fn retry_text(&self) -> Result<Arc<ChapterText>> {
        let chapter = self.state.lock().chapter;
        self.text.invalidate(chapter);
        self.load_text(chapter).await
    }

    pub async fn load_text(&self, chapter: u32) -> Result<Arc<ChapterText>> {
        self.check_bounds(chapter)?;
        self.text.fetch_chapter(chapter).await.map_err(|e| {
            self.state.lock().last_error = Some(e.clone());
            e
        })
    }

    // ========================================================================
    // Sleep timer
    // ========================================================================

    pub fn set_sleep_timer(&self, minutes: i64) -> Result<DateTime<Utc>> {
        self.sleep_timer.set(minutes)
    }

    pub fn cancel_sleep_timer(&self) -> bool {
        self.sleep_timer.cancel()
    }

    pub fn sleep_timer_remaining_secs(&self) -> Option<u64> {
        self.sleep_timer.remaining_secs()
    }

    // ========================================================================
    // Background work
    // ========================================================================

    /// Poll the controller every `status_poll_interval`, syncing the playing
    /// flag and emitting `PositionChanged`. Ends when the orchestrator is dropped.
    pub fn spawn_status_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.status_poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(this) = weak.upgrade() else {
                    break;
                };
                this.poll_status().await;
            }
        })
    }

    /// One status poll. No-op while nothing is loaded.
    pub async fn poll_status(&self) {
        let Some(status) = self.controller.status().await else {
            return;
        };
        if !status.is_loaded {
            return;
        }

        let chapter = {
            let mut state = self.state.lock();
            state.is_playing = status.is_playing;
            state.loaded_chapter
        };
        if let Some(chapter) = chapter {
            let _ = self
                .events
                .emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                    chapter,
                    position_ms: status.position.as_millis() as u64,
                    duration_ms: status.duration.map(|d| d.as_millis() as u64),
                    is_playing: status.is_playing,
                }));
        }
    }

    /// Release the engine and forget the loaded chapter, keeping the
    /// selection and the sleep timer. Used before cached files are removed.
    #[instrument(skip(self))]
    pub async fn release_audio(&self) {
        let _intent = self.intents.lock().await;
        self.claim_sequence();
        self.controller.unload().await;
        self.state.lock().clear_audio();
        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Unloaded));
    }

    /// Cancel the sleep timer and release the engine.
    pub async fn shutdown(&self) {
        let _intent = self.intents.lock().await;
        self.claim_sequence();
        self.sleep_timer.cancel();
        self.controller.unload().await;
        self.state.lock().clear_audio();
        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Unloaded));
    }

    // ========================================================================
    // Sequencing
    // ========================================================================

    async fn navigate(&self, target: u32) -> Result<Option<u32>> {
        self.stop().await;
        self.run_sequence(target).await.map(|()| Some(target))
    }

    async fn run_sequence(&self, chapter: u32) -> Result<()> {
        let seq = self.claim_sequence();
        let reciter = {
            let mut state = self.state.lock();
            state.chapter = chapter;
            state.last_error = None;
            state.reciter.clone()
        };

        match self.sequence_steps(seq, chapter, &reciter).await {
            Ok(()) => Ok(()),
            Err(e) if !self.is_current(seq) => {
                debug!("Stale request for chapter {} ended: {}", chapter, e);
                Err(PlaybackError::LoadSuperseded)
            }
            Err(e) => {
                self.fail(chapter, &e).await;
                Err(e)
            }
        }
    }

    async fn sequence_steps(&self, seq: u64, chapter: u32, reciter: &str) -> Result<()> {
        // Silence whatever is audible before starting the new chapter.
        let had_audio = {
            let _intent = self.intents.lock().await;
            self.ensure_current(seq)?;
            let had_audio = {
                let state = self.state.lock();
                state.is_loaded || state.is_playing
            };
            if had_audio {
                self.controller.stop().await;
                let mut state = self.state.lock();
                state.loaded_chapter = None;
                state.is_loaded = false;
                state.is_playing = false;
            }
            had_audio
        };
        if had_audio {
            tokio::time::sleep(self.config.transition_settle).await;
        }

        let path = match self.fetcher.cached_path(chapter, reciter).await {
            Some(path) => path,
            None => {
                self.set_if_current(seq, |state| state.is_downloading = true);
                let downloaded = self.fetcher.download(chapter, reciter).await;
                self.set_if_current(seq, |state| state.is_downloading = false);
                downloaded?
            }
        };

        let _intent = self.intents.lock().await;
        self.ensure_current(seq)?;

        self.controller.load_audio(&path.to_string_lossy()).await?;
        {
            let mut state = self.state.lock();
            state.is_loaded = true;
            state.loaded_chapter = Some(chapter);
        }
        let duration_ms = self
            .controller
            .status()
            .await
            .and_then(|status| status.duration)
            .map(|d| d.as_millis() as u64);
        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Loaded {
            chapter,
            reciter: reciter.to_string(),
            duration_ms,
        }));

        self.controller.play().await?;
        self.state.lock().is_playing = true;
        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Started {
            chapter,
            reciter: reciter.to_string(),
        }));
        info!(chapter, reciter, "Playback started");
        Ok(())
    }

    /// Roll back flags, clean up a half-loaded engine and report.
    async fn fail(&self, chapter: u32, err: &PlaybackError) {
        error!(chapter, "Playback pipeline failed: {}", err);
        {
            let mut state = self.state.lock();
            state.clear_audio();
            state.last_error = Some(err.clone());
        }

        if matches!(err.category(), ErrorKind::Load | ErrorKind::PlaybackState)
            && *err != PlaybackError::LoadSuperseded
        {
            self.controller.unload().await;
        }

        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Error {
            chapter: Some(chapter),
            kind: err.category(),
            message: err.user_message(),
        }));
    }

    async fn stop_locked(&self) {
        self.controller.stop().await;
        let chapter = {
            let mut state = self.state.lock();
            state.is_playing = false;
            state.loaded_chapter
        };
        let _ = self
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Stopped { chapter }));
    }

    fn check_bounds(&self, chapter: u32) -> Result<()> {
        if chapter == 0 || chapter > self.config.chapter_count {
            warn!(chapter, "Chapter out of range");
            return Err(PlaybackError::ChapterOutOfRange {
                chapter,
                max: self.config.chapter_count,
            });
        }
        Ok(())
    }

    /// Start a new sequence and drop the download flag of any older one.
    fn claim_sequence(&self) -> u64 {
        let mut state = self.state.lock();
        state.is_downloading = false;
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, seq: u64) -> bool {
        self.sequence.load(Ordering::SeqCst) == seq
    }

    fn ensure_current(&self, seq: u64) -> Result<()> {
        if self.is_current(seq) {
            Ok(())
        } else {
            Err(PlaybackError::LoadSuperseded)
        }
    }

    fn set_if_current(&self, seq: u64, update: impl FnOnce(&mut OrchestratorState)) {
        let mut state = self.state.lock();
        if self.is_current(seq) {
            update(&mut state);
        }
    }
}
