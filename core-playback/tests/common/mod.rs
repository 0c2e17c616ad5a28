//! Fakes shared by the playback integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::playback::{
    AudioEngine, AudioEngineFactory, AudioSessionPolicy, AudioSource, EngineSnapshot,
};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Audio engine
// ============================================================================

/// Shared state of one fake native player.
pub struct EngineState {
    pub uri: String,
    pub snapshot: Mutex<EngineSnapshot>,
    pub released: Mutex<bool>,
    log: Arc<Mutex<Vec<String>>>,
}

impl EngineState {
    pub fn mark_ready(&self) {
        let mut snapshot = self.snapshot.lock();
        snapshot.is_loaded = true;
        snapshot.duration = Some(Duration::from_secs(300));
    }

    pub fn is_released(&self) -> bool {
        *self.released.lock()
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.lock().is_playing
    }

    fn record(&self, action: &str) {
        self.log.lock().push(format!("{} {}", action, self.uri));
    }
}

struct FakeEngine {
    state: Arc<EngineState>,
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn snapshot(&self) -> EngineSnapshot {
        *self.state.snapshot.lock()
    }

    async fn play(&self) -> BridgeResult<()> {
        self.state.record("play");
        let mut snapshot = self.state.snapshot.lock();
        if !snapshot.is_loaded {
            return Err(BridgeError::Engine("not loaded".into()));
        }
        snapshot.is_playing = true;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.state.record("pause");
        self.state.snapshot.lock().is_playing = false;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.state.record("seek");
        let mut snapshot = self.state.snapshot.lock();
        if !snapshot.is_loaded {
            return Err(BridgeError::Engine("seek before load".into()));
        }
        snapshot.position = position;
        Ok(())
    }

    async fn release(&self) -> BridgeResult<()> {
        self.state.record("release");
        *self.state.released.lock() = true;
        self.state.snapshot.lock().is_playing = false;
        Ok(())
    }
}

/// Factory producing fake engines. With `auto_ready` the engines report
/// loaded immediately; otherwise tests call [`EngineState::mark_ready`].
pub struct FakeEngineFactory {
    auto_ready: bool,
    pub engines: Mutex<Vec<Arc<EngineState>>>,
    pub log: Arc<Mutex<Vec<String>>>,
    pub session_configs: AtomicUsize,
    pub fail_session_config: bool,
}

impl FakeEngineFactory {
    pub fn ready() -> Arc<Self> {
        Arc::new(Self::with_ready(true))
    }

    pub fn manual() -> Arc<Self> {
        Arc::new(Self::with_ready(false))
    }

    pub fn with_ready(auto_ready: bool) -> Self {
        Self {
            auto_ready,
            engines: Mutex::new(Vec::new()),
            log: Arc::new(Mutex::new(Vec::new())),
            session_configs: AtomicUsize::new(0),
            fail_session_config: false,
        }
    }

    pub fn engine(&self, index: usize) -> Arc<EngineState> {
        self.engines.lock()[index].clone()
    }

    pub fn engine_count(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn live_engines(&self) -> usize {
        self.engines
            .lock()
            .iter()
            .filter(|engine| !engine.is_released())
            .count()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl AudioEngineFactory for FakeEngineFactory {
    async fn configure_session(&self, _policy: AudioSessionPolicy) -> BridgeResult<()> {
        self.session_configs.fetch_add(1, Ordering::SeqCst);
        if self.fail_session_config {
            return Err(BridgeError::NotAvailable("audio session".into()));
        }
        Ok(())
    }

    async fn create(&self, source: &AudioSource) -> BridgeResult<Box<dyn AudioEngine>> {
        let state = Arc::new(EngineState {
            uri: source.uri(),
            snapshot: Mutex::new(EngineSnapshot::default()),
            released: Mutex::new(false),
            log: self.log.clone(),
        });
        if self.auto_ready {
            state.mark_ready();
        }
        state.record("create");
        self.engines.lock().push(state.clone());
        Ok(Box::new(FakeEngine { state }))
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: Bytes,
    /// Answer `Range` requests with `206` and the tail of the body.
    pub honour_range: bool,
}

/// In-memory HTTP client serving canned bodies by URL.
#[derive(Default)]
pub struct StubHttpClient {
    routes: Mutex<HashMap<String, StubResponse>>,
    pub requests: Mutex<Vec<HttpRequest>>,
    /// Delay before a stream is returned, to keep downloads in flight.
    pub stream_delay: Mutex<Option<Duration>>,
}

impl StubHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, status: u16, body: impl Into<Bytes>) {
        self.routes.lock().insert(
            url.to_string(),
            StubResponse {
                status,
                body: body.into(),
                honour_range: false,
            },
        );
    }

    pub fn route_resumable(&self, url: &str, body: impl Into<Bytes>) {
        self.routes.lock().insert(
            url.to_string(),
            StubResponse {
                status: 200,
                body: body.into(),
                honour_range: true,
            },
        );
    }

    pub fn json(&self, url: &str, value: serde_json::Value) {
        self.route(url, 200, value.to_string());
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    fn lookup(&self, request: &HttpRequest) -> BridgeResult<StubResponse> {
        self.requests.lock().push(request.clone());
        self.routes
            .lock()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("connection refused: {}", request.url)))
    }
}

#[async_trait]
impl HttpClient for StubHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let stub = self.lookup(&request)?;
        Ok(HttpResponse {
            status: stub.status,
            headers: HashMap::new(),
            body: stub.body,
        })
    }

    async fn open_stream(&self, request: HttpRequest) -> BridgeResult<HttpStream> {
        let stub = self.lookup(&request)?;
        let delay = *self.stream_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let offset = request
            .headers
            .get("Range")
            .and_then(|range| range.strip_prefix("bytes="))
            .and_then(|range| range.trim_end_matches('-').parse::<usize>().ok());

        let (status, body) = match offset {
            Some(offset) if stub.honour_range && offset < stub.body.len() => {
                (206, stub.body.slice(offset..))
            }
            _ => (stub.status, stub.body.clone()),
        };

        Ok(HttpStream {
            status,
            reason: Some(reason_for(status).to_string()),
            content_length: Some(body.len() as u64),
            body: Box::new(Cursor::new(body.to_vec())),
        })
    }
}

fn reason_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Wall clock that follows tokio's (pausable) time.
pub struct TokioClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap(),
            start: tokio::time::Instant::now(),
        })
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.start;
        self.base + chrono::Duration::from_std(elapsed).unwrap()
    }
}

/// Wall clock moved by hand, independent of tokio time.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap()),
        })
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const AUDIO_BASE: &str = "https://audio.test/api/audio";
pub const TEXT_BASE: &str = "https://text.test/v1";

pub fn audio_url(chapter: u32, reciter_key: &str) -> String {
    format!("https://cdn.test/{}/{:03}.mp3", reciter_key, chapter)
}

/// Register an audio index for `chapter` and a body for each reciter's file.
pub fn serve_chapter(http: &StubHttpClient, chapter: u32, audio_bytes: usize) {
    let mut index = serde_json::Map::new();
    for key in ["1", "2", "3", "4"] {
        index.insert(
            key.to_string(),
            serde_json::json!({
                "reciter": format!("Reciter {}", key),
                "url": format!("https://mirror.test/{}/{}.mp3", key, chapter),
                "originalUrl": audio_url(chapter, key),
            }),
        );
        http.route(&audio_url(chapter, key), 200, vec![7u8; audio_bytes]);
    }
    http.json(
        &format!("{}/{}.json", AUDIO_BASE, chapter),
        serde_json::Value::Object(index),
    );
}
