//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the recitation core:
//! - Logging and tracing infrastructure, plus an in-memory recent-log buffer
//! - Configuration management and bridge capability checks
//! - Event bus system
//!
//! Other crates depend on this one for the logging conventions, the
//! [`CoreConfig`](config::CoreConfig) they are constructed from, and the
//! [`EventBus`](events::EventBus) they publish to.

pub mod config;
pub mod error;
pub mod events;
pub mod log_buffer;
pub mod logging;

pub use error::{Error, Result};
