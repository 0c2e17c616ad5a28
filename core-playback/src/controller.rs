//! # Playback Controller
//!
//! Owns the single audio engine session.
//!
//! ## State machine
//!
//! ```text
//! Empty ──load──> Loading ──ready──> Paused <──play/pause──> Playing
//!   ^                                  │                        │
//!   └────────────── unload ────────────┴────────────────────────┘
//! ```
//!
//! Every `load_audio` fully retires the previous session (pause, rewind,
//! release) before the factory is asked for a new engine, so two recitations
//! can never sound at once. The slot lock is held across retirement and
//! creation, but not while waiting for the engine to report readiness; a load
//! that is overtaken by a newer one while waiting fails with
//! [`PlaybackError::LoadSuperseded`].

use bridge_traits::playback::{
    AudioEngine, AudioEngineFactory, AudioSessionPolicy, AudioSource, EngineSnapshot,
    PlaybackSessionId,
};
use core_runtime::config::PlaybackTimings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Empty,
    /// Engine created, not yet ready.
    Loading,
    Paused,
    Playing,
}

/// Snapshot of the live session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub session_id: PlaybackSessionId,
    pub source: AudioSource,
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
}

impl PlaybackStatus {
    pub fn state(&self) -> ControllerState {
        match (self.is_loaded, self.is_playing) {
            (false, _) => ControllerState::Loading,
            (true, true) => ControllerState::Playing,
            (true, false) => ControllerState::Paused,
        }
    }
}

struct Session {
    id: PlaybackSessionId,
    source: AudioSource,
    engine: Arc<dyn AudioEngine>,
}

pub struct PlaybackController {
    factory: Arc<dyn AudioEngineFactory>,
    policy: AudioSessionPolicy,
    timings: PlaybackTimings,
    session_configured: AtomicBool,
    slot: Mutex<Option<Session>>,
}

impl PlaybackController {
    pub fn new(factory: Arc<dyn AudioEngineFactory>, timings: PlaybackTimings) -> Self {
        Self {
            factory,
            policy: AudioSessionPolicy::default(),
            timings,
            session_configured: AtomicBool::new(false),
            slot: Mutex::new(None),
        }
    }

    pub fn with_session_policy(mut self, policy: AudioSessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timings(&self) -> &PlaybackTimings {
        &self.timings
    }

    /// Bind `location` (a path, `file://` URI or URL) to a fresh engine and
    /// wait until it reports loaded.
    ///
    /// On timeout the new session stays in the slot; call [`unload`](Self::unload)
    /// or [`stop`](Self::stop) to clean it up.
    #[instrument(skip(self))]
    pub async fn load_audio(&self, location: &str) -> Result<PlaybackSessionId> {
        self.ensure_session_configured().await;

        let source = AudioSource::from_location(location);
        if source.is_remote() {
            debug!("Loading remote source directly");
        }

        let (id, engine) = {
            let mut slot = self.slot.lock().await;
            if let Some(previous) = slot.take() {
                Self::retire(previous).await;
            }

            let engine: Arc<dyn AudioEngine> = match self.factory.create(&source).await {
                Ok(engine) => Arc::from(engine),
                Err(e) => {
                    error!("Audio engine rejected source: {}", e);
                    return Err(PlaybackError::LoadFailed(e.to_string()));
                }
            };
            let id = PlaybackSessionId::new();
            *slot = Some(Session {
                id,
                source,
                engine: engine.clone(),
            });
            (id, engine)
        };

        self.wait_until_loaded(id, engine.as_ref(), self.timings.load_timeout)
            .await
            .map_err(|e| {
                match &e {
                    PlaybackError::LoadSuperseded => info!("Load superseded by a newer request"),
                    other => error!("Audio failed to load: {}", other),
                }
                e
            })?;

        info!(session = %id.as_uuid(), "Audio loaded");
        Ok(id)
    }

    /// Start or resume playback, waiting briefly for a session that is still
    /// loading.
    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let (id, engine) = self.current().await.ok_or(PlaybackError::NoAudioLoaded)?;

        match self
            .wait_until_loaded(id, engine.as_ref(), self.timings.play_ready_timeout)
            .await
        {
            Ok(()) => {}
            Err(PlaybackError::LoadTimeout(_)) | Err(PlaybackError::LoadSuperseded) => {
                warn!("Play requested before audio was ready");
                return Err(PlaybackError::NotReady);
            }
            Err(e) => return Err(e),
        }

        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(session) if session.id == id => session
                .engine
                .play()
                .await
                .map_err(|e| PlaybackError::Engine(e.to_string())),
            _ => Err(PlaybackError::NotReady),
        }
    }

    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let slot = self.slot.lock().await;
        let session = slot.as_ref().ok_or(PlaybackError::NoAudioLoaded)?;
        session
            .engine
            .pause()
            .await
            .map_err(|e| PlaybackError::Engine(e.to_string()))
    }

    /// Pause and rewind if something is playing. Never fails.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let slot = self.slot.lock().await;
        let Some(session) = slot.as_ref() else {
            return;
        };

        if !session.engine.snapshot().await.is_playing {
            return;
        }
        if let Err(e) = session.engine.pause().await {
            warn!("Failed to pause on stop: {}", e);
        }
        if let Err(e) = session.engine.seek(Duration::ZERO).await {
            debug!("Ignoring rewind failure on stop: {}", e);
        }
        info!("Playback stopped");
    }

    /// Release the engine and return to `Empty`. Never fails.
    #[instrument(skip(self))]
    pub async fn unload(&self) {
        let session = self.slot.lock().await.take();
        if let Some(session) = session {
            if let Err(e) = session.engine.release().await {
                warn!("Failed to release audio engine: {}", e);
            }
            info!("Audio unloaded");
        }
    }

    /// Current session state, or `None` when empty.
    pub async fn status(&self) -> Option<PlaybackStatus> {
        let (id, source, engine) = {
            let slot = self.slot.lock().await;
            let session = slot.as_ref()?;
            (session.id, session.source.clone(), session.engine.clone())
        };

        let EngineSnapshot {
            is_loaded,
            is_playing,
            position,
            duration,
        } = engine.snapshot().await;

        Some(PlaybackStatus {
            session_id: id,
            source,
            is_loaded,
            is_playing,
            position,
            duration,
        })
    }

    pub async fn state(&self) -> ControllerState {
        self.status()
            .await
            .map_or(ControllerState::Empty, |status| status.state())
    }

    pub async fn has_session(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    async fn current(&self) -> Option<(PlaybackSessionId, Arc<dyn AudioEngine>)> {
        self.slot
            .lock()
            .await
            .as_ref()
            .map(|session| (session.id, session.engine.clone()))
    }

    async fn is_current(&self, id: PlaybackSessionId) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| session.id == id)
    }

    async fn wait_until_loaded(
        &self,
        id: PlaybackSessionId,
        engine: &dyn AudioEngine,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_current(id).await {
                return Err(PlaybackError::LoadSuperseded);
            }
            if engine.snapshot().await.is_loaded {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PlaybackError::LoadTimeout(timeout));
            }
            tokio::time::sleep(self.timings.ready_poll_interval).await;
        }
    }

    async fn ensure_session_configured(&self) {
        if self.session_configured.load(Ordering::Acquire) {
            return;
        }
        match self.factory.configure_session(self.policy).await {
            Ok(()) => {
                self.session_configured.store(true, Ordering::Release);
                debug!(policy = ?self.policy, "Audio session configured");
            }
            Err(e) => warn!("Failed to configure audio session: {}", e),
        }
    }

    /// Pause, rewind and release a session that is being replaced.
    async fn retire(session: Session) {
        debug!(session = %session.id.as_uuid(), "Retiring previous session");
        if session.engine.snapshot().await.is_playing {
            if let Err(e) = session.engine.pause().await {
                warn!("Failed to pause retiring session: {}", e);
            }
        }
        if let Err(e) = session.engine.seek(Duration::ZERO).await {
            debug!("Ignoring rewind failure on retire: {}", e);
        }
        if let Err(e) = session.engine.release().await {
            warn!("Failed to release retiring session: {}", e);
        }
    }
}
