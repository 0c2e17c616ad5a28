//! # Track Resolver
//!
//! Turns `(chapter, reciter)` into the remote URL to download, using the
//! per-chapter audio index: `GET {base}/{chapter}.json` returning
//! `{ "<key>": { "reciter": .., "url": .., "originalUrl": .. } }`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::reciters;

/// Source of download URLs for recitations.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolve a validated `http`/`https` URL for the chapter and reciter.
    async fn resolve_audio_url(&self, chapter: u32, reciter: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct AudioIndexEntry {
    #[serde(default)]
    reciter: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "originalUrl")]
    original_url: Option<String>,
}

/// Resolver backed by the public audio index API.
pub struct AudioIndexResolver {
    http: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
}

impl AudioIndexResolver {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn index_url(&self, chapter: u32) -> String {
        format!("{}/{}.json", self.base_url, chapter)
    }
}

#[async_trait]
impl TrackResolver for AudioIndexResolver {
    #[instrument(skip(self))]
    async fn resolve_audio_url(&self, chapter: u32, reciter: &str) -> Result<String> {
        let key = reciters::catalog_key(reciter);
        if !reciters::is_known(reciter) {
            warn!("Unknown reciter {:?}, using index key {}", reciter, key);
        }

        let request = HttpRequest::get(self.index_url(chapter))
            .accept_json()
            .timeout(self.timeout);
        let response = self.http.execute(request).await.map_err(|e| {
            error!("Audio index request failed: {}", e);
            PlaybackError::Resolution(e.to_string())
        })?;

        if !response.is_success() {
            error!(status = response.status, "Audio index returned an error");
            return Err(PlaybackError::Resolution(format!(
                "audio index returned HTTP {}",
                response.status
            )));
        }

        let mut index: HashMap<String, serde_json::Value> = response
            .json()
            .map_err(|e| PlaybackError::Resolution(format!("malformed audio index: {}", e)))?;

        let entry = index.remove(key).ok_or_else(|| {
            PlaybackError::Resolution(format!(
                "no audio for reciter key {} in chapter {}",
                key, chapter
            ))
        })?;
        let entry: AudioIndexEntry = serde_json::from_value(entry)
            .map_err(|e| PlaybackError::Resolution(format!("malformed index entry: {}", e)))?;

        let url = select_url(&entry).ok_or_else(|| {
            PlaybackError::Resolution(format!("index entry for key {} has no URL", key))
        })?;
        validate_audio_url(url)?;

        debug!(reciter = ?entry.reciter, "Resolved audio URL");
        Ok(url.to_string())
    }
}

fn select_url(entry: &AudioIndexEntry) -> Option<&str> {
    [entry.original_url.as_deref(), entry.url.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|u| !u.is_empty())
}

/// Reject anything that is not an absolute `http`/`https` URL.
pub fn validate_audio_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| PlaybackError::Resolution(format!("invalid audio URL {:?}: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(()),
        scheme => Err(PlaybackError::Resolution(format!(
            "unsupported audio URL scheme {:?} in {:?}",
            scheme, raw
        ))),
    }
}
