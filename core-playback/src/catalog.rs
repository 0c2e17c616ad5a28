//! Chapter text client.
//!
//! Fetches the Arabic text and one translation edition of a chapter in
//! parallel and memoises the result per chapter. Clearing a chapter's entry and
//! fetching again is the "retry text" recovery path.

use bridge_traits::http::{HttpClient, HttpRequest};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ayah {
    /// Position in the whole text.
    pub number: u32,
    #[serde(default)]
    pub text: String,
    pub number_in_surah: u32,
}

/// Arabic text and translation of one chapter, ayah lists in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterText {
    pub chapter: u32,
    pub arabic: Vec<Ayah>,
    pub translation: Vec<Ayah>,
}

impl ChapterText {
    pub fn ayah_count(&self) -> usize {
        self.arabic.len()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: SurahData,
}

#[derive(Debug, Deserialize)]
struct SurahData {
    #[serde(default)]
    ayahs: Vec<Ayah>,
}

pub struct ChapterTextClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    translation_code: String,
    timeout: Duration,
    cache: Mutex<HashMap<u32, Arc<ChapterText>>>,
}

impl ChapterTextClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        translation_code: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            translation_code: translation_code.into(),
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Text of `chapter`, served from memory after the first success.
    #[instrument(skip(self))]
    pub async fn fetch_chapter(&self, chapter: u32) -> Result<Arc<ChapterText>> {
        let cached = self.cache.lock().get(&chapter).cloned();
        if let Some(text) = cached {
            debug!("Chapter text served from memory");
            return Ok(text);
        }

        let arabic_url = format!("{}/surah/{}", self.base_url, chapter);
        let translation_url = format!(
            "{}/surah/{}/{}",
            self.base_url, chapter, self.translation_code
        );
        let (arabic, translation) =
            tokio::try_join!(self.fetch_ayahs(&arabic_url), self.fetch_ayahs(&translation_url))?;

        let text = Arc::new(ChapterText {
            chapter,
            arabic,
            translation,
        });
        self.cache.lock().insert(chapter, text.clone());
        Ok(text)
    }

    /// Drop the memoised text for `chapter` so the next fetch goes to the network.
    pub fn invalidate(&self, chapter: u32) {
        self.cache.lock().remove(&chapter);
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn is_cached(&self, chapter: u32) -> bool {
        self.cache.lock().contains_key(&chapter)
    }

    async fn fetch_ayahs(&self, url: &str) -> Result<Vec<Ayah>> {
        let request = HttpRequest::get(url).accept_json().timeout(self.timeout);
        let response = self.http.execute(request).await.map_err(|e| {
            error!(url, "Chapter text request failed: {}", e);
            PlaybackError::Text(e.to_string())
        })?;

        if !response.is_success() {
            error!(url, status = response.status, "Chapter text request failed");
            return Err(PlaybackError::Text(format!("HTTP {} from {}", response.status, url)));
        }

        let envelope: Envelope = response
            .json()
            .map_err(|e| PlaybackError::Text(format!("malformed response from {}: {}", url, e)))?;
        Ok(envelope.data.ayahs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_api_envelope() {
        let body = r#"{
            "code": 200,
            "status": "OK",
            "data": {
                "number": 1,
                "englishName": "Al-Faatiha",
                "ayahs": [
                    {"number": 1, "text": "In the name of God", "numberInSurah": 1, "juz": 1},
                    {"number": 2, "numberInSurah": 2}
                ]
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.ayahs.len(), 2);
        assert_eq!(envelope.data.ayahs[0].text, "In the name of God");
        assert_eq!(envelope.data.ayahs[1].text, "");
        assert_eq!(envelope.data.ayahs[1].number_in_surah, 2);
    }
}
