use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl CoreError {
    /// Sentence suitable for showing to the listener.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Playback(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
