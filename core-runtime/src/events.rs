//! # Event Bus System
//!
//! Typed events broadcast from the recitation core to the host UI over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps one enum per domain (playback,
//!   download, sleep timer)
//! - **EventBus**: cloneable broadcast sender
//! - **EventStream**: receiver wrapper with an optional predicate
//!
//! ```text
//! ┌──────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Orchestrator ├─────────>│           ├────────────>│  Host UI   │
//! └──────────────┘          │ EventBus  │             └────────────┘
//! ┌──────────────┐   emit   │           │  subscribe  ┌────────────┐
//! │ Sleep timer  ├─────────>│           ├────────────>│ Diagnostics│
//! └──────────────┘          └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus, EventStream};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut downloads = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Download(_)));
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Progress {
//!     chapter: 1,
//!     reciter: "mishary".to_string(),
//!     percent: 40,
//! }))
//! .ok();
//!
//! assert!(matches!(downloads.recv().await, Ok(CoreEvent::Download(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Progress and position events are superseded by later ones, so
//!   subscribers should keep reading.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; producers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Download(DownloadEvent),
    SleepTimer(SleepTimerEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
            CoreEvent::SleepTimer(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::SleepTimer(SleepTimerEvent::Expired) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Failure class reported alongside playback errors, mirroring the retry
/// affordances a host can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No usable audio URL could be determined.
    Resolution,
    /// Transfer failed or produced an unusable file.
    Download,
    /// The engine did not accept the file in time.
    Load,
    /// Transport control was used without loaded audio.
    PlaybackState,
    /// Rejected argument, such as a non-positive sleep duration.
    Input,
    Other,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events describing the single playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Audio is bound to the engine and ready to play.
    Loaded {
        chapter: u32,
        reciter: String,
        duration_ms: Option<u64>,
    },
    Started {
        chapter: u32,
        reciter: String,
    },
    Paused {
        chapter: u32,
        position_ms: u64,
    },
    /// Playback stopped and position reset, by the user, navigation or the sleep timer.
    Stopped {
        chapter: Option<u32>,
    },
    Unloaded,
    /// Periodic status poll.
    PositionChanged {
        chapter: u32,
        position_ms: u64,
        duration_ms: Option<u64>,
        is_playing: bool,
    },
    Error {
        chapter: Option<u32>,
        kind: ErrorKind,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loaded { .. } => "Audio loaded",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Unloaded => "Audio unloaded",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events for audio acquisition on a cache miss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    Started {
        chapter: u32,
        reciter: String,
        url: String,
    },
    Progress {
        chapter: u32,
        reciter: String,
        /// 0-100
        percent: u8,
    },
    Completed {
        chapter: u32,
        reciter: String,
        bytes: u64,
    },
    Failed {
        chapter: u32,
        reciter: String,
        message: String,
    },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download in progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
        }
    }
}

// ============================================================================
// Sleep Timer Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SleepTimerEvent {
    Set {
        /// Absolute end time, Unix epoch milliseconds.
        ends_at_ms: i64,
    },
    Cancelled,
    Expired,
}

impl SleepTimerEvent {
    fn description(&self) -> &str {
        match self {
            SleepTimerEvent::Set { .. } => "Sleep timer set",
            SleepTimerEvent::Cancelled => "Sleep timer cancelled",
            SleepTimerEvent::Expired => "Sleep timer expired",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it, or `Err` if there
    /// were none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that skips events not matching an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
