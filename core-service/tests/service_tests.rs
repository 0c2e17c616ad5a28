//! Façade assembly from a `CoreConfig` with mocked host bridges.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::playback::{AudioEngine, AudioEngineFactory, AudioSource, EngineSnapshot};
use core_runtime::config::CoreConfig;
use core_service::{
    CoreError, CoreEvent, PlaybackError, RecitationService, SqliteSettingsStore, TokioFileSystem,
};
use mockall::mock;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn open_stream(&self, request: HttpRequest) -> BridgeResult<HttpStream>;
    }
}

mock! {
    AudioEngine {}

    #[async_trait]
    impl AudioEngine for AudioEngine {
        async fn snapshot(&self) -> EngineSnapshot;
        async fn play(&self) -> BridgeResult<()>;
        async fn pause(&self) -> BridgeResult<()>;
        async fn seek(&self, position: Duration) -> BridgeResult<()>;
        async fn release(&self) -> BridgeResult<()>;
    }
}

mock! {
    EngineFactory {}

    #[async_trait]
    impl AudioEngineFactory for EngineFactory {
        async fn create(&self, source: &AudioSource) -> BridgeResult<Box<dyn AudioEngine>>;
    }
}

const AUDIO_BYTES: usize = 40 * 1024;

fn index_body() -> bytes::Bytes {
    let body = serde_json::json!({
        "1": {"reciter": "Mishary Rashid Al-Afasy", "originalUrl": "https://cdn.test/1/001.mp3"},
        "2": {"reciter": "Abu Bakr Al-Shatri", "originalUrl": "https://cdn.test/2/001.mp3"}
    });
    bytes::Bytes::from(body.to_string())
}

fn mock_http() -> MockHttpClient {
    let mut http = MockHttpClient::new();
    http.expect_execute().returning(|request| {
        let status = if request.url.ends_with("/1.json") { 200 } else { 404 };
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: index_body(),
        })
    });
    http.expect_open_stream().returning(|_| {
        Ok(HttpStream {
            status: 200,
            reason: Some("OK".to_string()),
            content_length: Some(AUDIO_BYTES as u64),
            body: Box::new(Cursor::new(vec![3u8; AUDIO_BYTES])),
        })
    });
    http
}

fn ready_engine() -> MockAudioEngine {
    let mut engine = MockAudioEngine::new();
    engine.expect_snapshot().returning(|| EngineSnapshot {
        is_loaded: true,
        duration: Some(Duration::from_secs(90)),
        ..Default::default()
    });
    engine.expect_play().returning(|| Ok(()));
    engine.expect_pause().returning(|| Ok(()));
    engine.expect_seek().returning(|_| Ok(()));
    engine.expect_release().returning(|| Ok(()));
    engine
}

fn mock_factory() -> MockEngineFactory {
    let mut factory = MockEngineFactory::new();
    factory
        .expect_create()
        .returning(|_| Ok(Box::new(ready_engine()) as Box<dyn AudioEngine>));
    factory
}

async fn service_in(dir: &tempfile::TempDir) -> RecitationService {
    let config = CoreConfig::builder()
        .http_client(Arc::new(mock_http()))
        .file_system(Arc::new(TokioFileSystem::with_directories(
            dir.path().join("cache"),
            dir.path().join("data"),
        )))
        .settings_store(Arc::new(SqliteSettingsStore::in_memory().await.unwrap()))
        .audio_engine_factory(Arc::new(mock_factory()))
        .audio_api_base("https://audio.test/api/audio")
        .chapter_count(114)
        .build()
        .await
        .unwrap();
    RecitationService::new(config).await.unwrap()
}

#[tokio::test]
async fn test_play_fills_cache_and_clear_empties_it() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir).await;
    let mut events = service.subscribe().filter(|e| matches!(e, CoreEvent::Download(_)));

    service.play_chapter(1).await.unwrap();

    let state = service.state();
    assert_eq!(state.reciter, "mishary");
    assert!(state.is_playing);
    assert!(matches!(events.try_recv(), Some(Ok(CoreEvent::Download(_)))));

    let usage = service.cache_usage().await;
    assert_eq!(usage.file_count, 1);
    assert_eq!(usage.total_bytes, AUDIO_BYTES as u64);
    assert!(dir.path().join("cache").join("quran-audio").exists());

    service.clear_cache().await.unwrap();
    assert_eq!(service.cache_usage().await.file_count, 0);
    let state = service.state();
    assert!(!state.is_playing);
    assert!(!state.is_loaded);
    assert_eq!(state.loaded_chapter, None);

    // Nothing left to resume, so the toggle fetches the chapter again.
    service.toggle_play_pause().await.unwrap();
    assert!(service.state().is_playing);
    assert_eq!(service.cache_usage().await.file_count, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_failures_surface_as_playback_errors() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir).await;

    let err = service.play_chapter(2).await.unwrap_err();
    assert!(matches!(err, CoreError::Playback(PlaybackError::Resolution(_))));
    assert_eq!(err.user_message(), "Could not determine the audio source.");

    let err = service.set_sleep_timer(0).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Playback(PlaybackError::InvalidSleepDuration(0))
    ));
}

#[tokio::test]
async fn test_reciter_choice_survives_restart_of_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
    let build = |settings: Arc<SqliteSettingsStore>| {
        let fs = Arc::new(TokioFileSystem::with_directories(
            dir.path().join("cache"),
            dir.path().join("data"),
        ));
        async move {
            let config = CoreConfig::builder()
                .http_client(Arc::new(mock_http()))
                .file_system(fs)
                .settings_store(settings)
                .audio_engine_factory(Arc::new(mock_factory()))
                .build()
                .await
                .unwrap();
            RecitationService::new(config).await.unwrap()
        }
    };

    let first = build(settings.clone()).await;
    assert_eq!(first.reciters().len(), 4);
    first.select_reciter("qatami").await;
    first.shutdown().await;

    let second = build(settings).await;
    assert_eq!(second.state().reciter, "qatami");
}

#[tokio::test]
async fn test_missing_engine_factory_is_reported() {
    let err = CoreConfig::builder()
        .http_client(Arc::new(mock_http()))
        .build()
        .await
        .map_err(CoreError::from)
        .unwrap_err();

    match err {
        CoreError::Runtime(core_runtime::Error::CapabilityMissing { capability, .. }) => {
            assert_eq!(capability, "AudioEngineFactory");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_status_updates_can_be_restarted() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir).await;

    service.start_status_updates();
    service.start_status_updates();
    service.stop_status_updates();
    service.shutdown().await;
}
