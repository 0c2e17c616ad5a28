//! # Recitation Acquisition & Playback
//!
//! Gets a chapter recitation from the remote catalog onto disk and through the
//! host audio engine.
//!
//! ## Overview
//!
//! This module handles:
//! - Content-addressed audio cache with size validation ([`cache`])
//! - Resumable, progress-reporting downloads with a size floor ([`download`])
//! - Audio URL resolution against the public audio index ([`resolver`])
//! - Single-session playback control with retire-before-load ([`controller`])
//! - Wall-clock sleep timer ([`sleep_timer`])
//! - Intent sequencing and failure rollback ([`orchestrator`])
//!
//! ```text
//! intent ─> PlaybackOrchestrator ─> AudioFetcher ─┬─> CacheStore
//!                  │                              ├─> TrackResolver
//!                  │                              └─> Downloader
//!                  └─> PlaybackController ─> AudioEngineFactory (host)
//! ```

pub mod cache;
pub mod catalog;
pub mod controller;
pub mod download;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod preferences;
pub mod reciters;
pub mod resolver;
pub mod sleep_timer;

pub use cache::{CacheConfig, CacheEntry, CacheKey, CacheStore, CacheUsage};
pub use catalog::{Ayah, ChapterText, ChapterTextClient};
pub use controller::{ControllerState, PlaybackController, PlaybackStatus};
pub use download::{DownloadConfig, DownloadTask, Downloader};
pub use error::{PlaybackError, Result};
pub use fetch::{AcquiredAudio, AudioFetcher, AudioOrigin};
pub use orchestrator::{OrchestratorConfig, OrchestratorState, PlaybackOrchestrator};
pub use preferences::{ReciterPreference, SELECTED_RECITER_KEY};
pub use reciters::{Reciter, DEFAULT_RECITER_ID, RECITERS};
pub use resolver::{AudioIndexResolver, TrackResolver};
pub use sleep_timer::{format_countdown, SleepAction, SleepTimer};
