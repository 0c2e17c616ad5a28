//! Playback bridge traits and supporting audio types.
//!
//! The host owns the native audio player (AVPlayer, ExoPlayer, ...). The core
//! only sees it through [`AudioEngineFactory`] and the [`AudioEngine`] handles
//! it creates, one handle per bound source.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// Source handed to the host engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) resource. Hosts are expected to download it before playing.
    RemoteStream { url: String },
}

impl AudioSource {
    /// Classify a location string as produced by the cache or a catalog.
    ///
    /// `file://` prefixes are stripped, `http(s)://` is treated as remote and
    /// anything else is taken as a bare file-system path.
    pub fn from_location(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            return AudioSource::RemoteStream {
                url: location.to_string(),
            };
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        AudioSource::LocalFile {
            path: PathBuf::from(path),
        }
    }

    pub fn local(path: impl AsRef<Path>) -> Self {
        AudioSource::LocalFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }

    /// URI form expected by native players.
    pub fn uri(&self) -> String {
        match self {
            AudioSource::RemoteStream { url } => url.clone(),
            AudioSource::LocalFile { path } => {
                let raw = path.to_string_lossy();
                if raw.starts_with('/') {
                    format!("file://{}", raw)
                } else {
                    format!("file:///{}", raw)
                }
            }
        }
    }
}

/// How the host should treat other apps' audio when ours starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionMode {
    DoNotMix,
    DuckOthers,
    MixWithOthers,
}

/// Process-wide audio session configuration applied before the first load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSessionPolicy {
    /// Keep playing when the device's silent switch is on (iOS).
    pub plays_in_silent_mode: bool,
    /// Keep playing when the app moves to the background.
    pub background_playback: bool,
    pub interruption_mode: InterruptionMode,
}

impl Default for AudioSessionPolicy {
    fn default() -> Self {
        Self {
            plays_in_silent_mode: true,
            background_playback: true,
            interruption_mode: InterruptionMode::DoNotMix,
        }
    }
}

/// Unique identifier for a bound playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a native player.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineSnapshot {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position: Duration,
    /// `None` until the engine has parsed enough of the source to know.
    pub duration: Option<Duration>,
}

/// Handle to one native player instance bound to one source.
///
/// Readiness is observed by polling [`AudioEngine::snapshot`]; the handle is
/// unusable after [`AudioEngine::release`].
#[async_trait]
pub trait AudioEngine: Send + Sync {
    async fn snapshot(&self) -> EngineSnapshot;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Free native resources. Must be safe to call on a paused player.
    async fn release(&self) -> Result<()>;
}

/// Creates engine handles and owns process-wide audio session state.
#[async_trait]
pub trait AudioEngineFactory: Send + Sync {
    /// Apply the audio session policy. Called once before the first `create`.
    async fn configure_session(&self, policy: AudioSessionPolicy) -> Result<()> {
        let _ = policy;
        Ok(())
    }

    /// Bind a new native player to `source`. Loading may continue
    /// asynchronously after this returns.
    async fn create(&self, source: &AudioSource) -> Result<Box<dyn AudioEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_become_file_uris() {
        let absolute = AudioSource::from_location("/data/quran-audio/surah-1-reciter-mishary.mp3");
        assert_eq!(
            absolute.uri(),
            "file:///data/quran-audio/surah-1-reciter-mishary.mp3"
        );

        let relative = AudioSource::from_location("quran-audio/a.mp3");
        assert_eq!(relative.uri(), "file:///quran-audio/a.mp3");
    }

    #[test]
    fn file_and_http_prefixes_pass_through() {
        let file = AudioSource::from_location("file:///tmp/a.mp3");
        assert_eq!(file, AudioSource::local("/tmp/a.mp3"));
        assert_eq!(file.uri(), "file:///tmp/a.mp3");

        let remote = AudioSource::from_location("https://cdn.example.com/a.mp3");
        assert!(remote.is_remote());
        assert_eq!(remote.uri(), "https://cdn.example.com/a.mp3");
    }

    #[test]
    fn default_session_policy_is_exclusive_background_audio() {
        let policy = AudioSessionPolicy::default();
        assert!(policy.plays_in_silent_mode);
        assert!(policy.background_playback);
        assert_eq!(policy.interruption_mode, InterruptionMode::DoNotMix);
    }

    #[test]
    fn session_id_is_unique() {
        let a = PlaybackSessionId::new();
        let b = PlaybackSessionId::new();
        assert_ne!(a, b);
        assert_eq!(a, PlaybackSessionId::from_uuid(*a.as_uuid()));
    }
}
