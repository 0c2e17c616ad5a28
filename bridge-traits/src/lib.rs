//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the recitation core and the
//! platform it runs on. Each trait represents a capability that the core
//! requires but that must be implemented differently per platform.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Catalog requests and streamed audio downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Audio cache directory access
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences (selected reciter)
//!
//! ### Audio
//! - [`AudioEngineFactory`](playback::AudioEngineFactory) - Creates native player handles
//! - [`AudioEngine`](playback::AudioEngine) - One native player bound to one source
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | HTTP, file system, settings |
//! | iOS      | host app            | all, including audio engine |
//! | Android  | host app            | all, including audio engine |
//!
//! No desktop audio engine ships with the core; hosts always inject one.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert native errors into it and keep the message
//! actionable (file path, HTTP status).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream, RetryPolicy};
pub use playback::{
    AudioEngine, AudioEngineFactory, AudioSessionPolicy, AudioSource, EngineSnapshot,
    InterruptionMode, PlaybackSessionId,
};
pub use storage::{FileMetadata, FileSystemAccess, SettingsStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
