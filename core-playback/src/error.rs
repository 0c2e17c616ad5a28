//! # Playback Error Types
//!
//! Failures of the acquisition-and-playback pipeline, grouped by the step
//! that produced them so the orchestrator can offer the matching recovery.

use core_runtime::events::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while resolving, downloading or playing recitations.
///
/// `Clone` so a single download outcome can be handed to every requester
/// waiting on the same cache key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// No usable audio URL for the chapter and reciter.
    #[error("Could not get audio URL: {0}")]
    Resolution(String),

    // ========================================================================
    // Download Errors
    // ========================================================================
    /// Transport or file I/O failure while downloading.
    #[error("Download failed: {0}")]
    Download(String),

    /// Server answered with a non-success status.
    #[error("Download failed: HTTP {status} {reason} ({url})")]
    DownloadHttp {
        status: u16,
        reason: String,
        url: String,
    },

    /// Transfer completed but the file is below the valid size floor,
    /// usually an error page saved as audio.
    #[error("Downloaded file is too small ({size} bytes), the audio URL may be invalid: {url}")]
    DownloadTooSmall { size: u64, url: String },

    /// Body is larger than any recitation the cache accepts.
    #[error("Downloaded file is too large ({size} bytes): {url}")]
    DownloadTooLarge { size: u64, url: String },

    // ========================================================================
    // Load Errors
    // ========================================================================
    /// The engine refused the source.
    #[error("Failed to load audio: {0}")]
    LoadFailed(String),

    /// The engine did not report readiness in time.
    #[error("Audio failed to load within {0:?}")]
    LoadTimeout(Duration),

    /// A newer load replaced this one before it became ready.
    #[error("Audio load superseded by a newer request")]
    LoadSuperseded,

    // ========================================================================
    // Playback State Errors
    // ========================================================================
    #[error("No audio loaded")]
    NoAudioLoaded,

    /// A session exists but never became ready for `play`.
    #[error("Audio not loaded, cannot play")]
    NotReady,

    /// The engine rejected a transport command.
    #[error("Playback command failed: {0}")]
    Engine(String),

    // ========================================================================
    // Input Errors
    // ========================================================================
    #[error("Sleep timer needs a positive number of minutes, got {0}")]
    InvalidSleepDuration(i64),

    #[error("Chapter {chapter} is outside 1..={max}")]
    ChapterOutOfRange { chapter: u32, max: u32 },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Clearing the cache failed; its contents are indeterminate.
    #[error("Failed to clear audio cache: {0}")]
    CacheClear(String),

    #[error("Cache configuration error: {0}")]
    CacheConfig(String),

    #[error("Settings error: {0}")]
    Settings(String),

    // ========================================================================
    // Text Errors
    // ========================================================================
    #[error("Failed to load chapter text: {0}")]
    Text(String),
}

impl PlaybackError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Download(_) | PlaybackError::LoadTimeout(_) | PlaybackError::Text(_) => {
                true
            }
            PlaybackError::DownloadHttp { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true for failures caused by the remote side or the transport.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Resolution(_)
                | PlaybackError::Download(_)
                | PlaybackError::DownloadHttp { .. }
                | PlaybackError::Text(_)
        )
    }

    /// Returns true if the cached file for the key should be discarded before
    /// retrying.
    pub fn suggests_cache_clear(&self) -> bool {
        matches!(
            self,
            PlaybackError::DownloadTooSmall { .. }
                | PlaybackError::DownloadTooLarge { .. }
                | PlaybackError::LoadFailed(_)
                | PlaybackError::LoadTimeout(_)
        )
    }

    pub fn category(&self) -> ErrorKind {
        match self {
            PlaybackError::Resolution(_) => ErrorKind::Resolution,
            PlaybackError::Download(_)
            | PlaybackError::DownloadHttp { .. }
            | PlaybackError::DownloadTooSmall { .. }
            | PlaybackError::DownloadTooLarge { .. } => ErrorKind::Download,
            PlaybackError::LoadFailed(_)
            | PlaybackError::LoadTimeout(_)
            | PlaybackError::LoadSuperseded => ErrorKind::Load,
            PlaybackError::NoAudioLoaded | PlaybackError::NotReady | PlaybackError::Engine(_) => {
                ErrorKind::PlaybackState
            }
            PlaybackError::InvalidSleepDuration(_) | PlaybackError::ChapterOutOfRange { .. } => {
                ErrorKind::Input
            }
            PlaybackError::CacheClear(_)
            | PlaybackError::CacheConfig(_)
            | PlaybackError::Settings(_)
            | PlaybackError::Text(_) => ErrorKind::Other,
        }
    }

    /// Short sentence suitable for showing next to a retry button.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorKind::Resolution => "Could not determine the audio source.".to_string(),
            ErrorKind::Download => format!("Audio download failed. {}", self),
            ErrorKind::Load => "Failed to load audio.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlaybackError::DownloadTooSmall {
            size: 512,
            url: "https://cdn.example.com/1.mp3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Downloaded file is too small (512 bytes), the audio URL may be invalid: https://cdn.example.com/1.mp3"
        );

        let err = PlaybackError::DownloadHttp {
            status: 404,
            reason: "Not Found".to_string(),
            url: "https://cdn.example.com/1.mp3".to_string(),
        };
        assert!(err.to_string().contains("HTTP 404 Not Found"));
    }

    #[test]
    fn test_transient_errors() {
        assert!(PlaybackError::Download("reset".into()).is_transient());
        assert!(PlaybackError::DownloadHttp {
            status: 503,
            reason: "Service Unavailable".into(),
            url: String::new()
        }
        .is_transient());
        assert!(!PlaybackError::DownloadHttp {
            status: 404,
            reason: "Not Found".into(),
            url: String::new()
        }
        .is_transient());
        assert!(!PlaybackError::NoAudioLoaded.is_transient());
    }

    #[test]
    fn test_categories_follow_pipeline_step() {
        assert_eq!(
            PlaybackError::Resolution("missing".into()).category(),
            ErrorKind::Resolution
        );
        assert_eq!(
            PlaybackError::DownloadTooSmall { size: 1, url: String::new() }.category(),
            ErrorKind::Download
        );
        assert_eq!(
            PlaybackError::LoadTimeout(Duration::from_secs(30)).category(),
            ErrorKind::Load
        );
        assert_eq!(PlaybackError::NoAudioLoaded.category(), ErrorKind::PlaybackState);
        assert_eq!(PlaybackError::InvalidSleepDuration(0).category(), ErrorKind::Input);
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            PlaybackError::Resolution("no entry".into()).user_message(),
            "Could not determine the audio source."
        );
        assert_eq!(
            PlaybackError::LoadFailed("bad file".into()).user_message(),
            "Failed to load audio."
        );
        assert!(PlaybackError::DownloadTooSmall { size: 10, url: "u".into() }
            .user_message()
            .contains("10 bytes"));
    }

    #[test]
    fn test_cache_clear_hint() {
        assert!(PlaybackError::DownloadTooSmall { size: 1, url: String::new() }.suggests_cache_clear());
        assert!(!PlaybackError::Resolution(String::new()).suggests_cache_clear());
    }
}
