//! In-memory ring of recent log entries for on-device diagnostics.
//!
//! Installed as a [`LoggerSink`] through
//! [`LoggingConfig::with_logger_sink`](crate::logging::LoggingConfig::with_logger_sink),
//! it lets a host show or share the last few playback failures without
//! shipping a log file.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::error::{Error, Result};

pub const DEFAULT_CAPACITY: usize = 50;

pub struct RecentLogBuffer {
    capacity: usize,
    min_level: LogLevel,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl RecentLogBuffer {
    pub fn new(capacity: usize, min_level: LogLevel) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            min_level,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// One line per entry: `[timestamp] LEVEL (target): message`.
    pub fn formatted(&self) -> String {
        self.entries
            .lock()
            .iter()
            .map(|entry| {
                format!(
                    "[{}] {} ({}): {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                    entry.level,
                    entry.target,
                    entry.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn export_json(&self) -> Result<String> {
        let entries = self.entries();
        serde_json::to_string_pretty(&entries)
            .map_err(|e| Error::Internal(format!("Failed to export logs: {}", e)))
    }
}

impl Default for RecentLogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, LogLevel::Info)
    }
}

#[async_trait]
impl LoggerSink for RecentLogBuffer {
    async fn log(&self, entry: LogEntry) -> BridgeResult<()> {
        self.push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
