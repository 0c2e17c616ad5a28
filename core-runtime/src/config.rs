//! # Core Configuration
//!
//! [`CoreConfig`] gathers the host bridges and the tunables the recitation
//! core needs. It is assembled with [`CoreConfig::builder`], which fails fast
//! with [`Error::CapabilityMissing`] when a required bridge was not injected
//! and no desktop default exists.
//!
//! ## Required vs. defaulted bridges
//!
//! | Bridge               | Desktop (`desktop-shims`)      | Mobile / no shims |
//! |----------------------|--------------------------------|-------------------|
//! | `HttpClient`         | `ReqwestHttpClient`            | required          |
//! | `FileSystemAccess`   | `TokioFileSystem`              | required          |
//! | `SettingsStore`      | `SqliteSettingsStore` in data dir | required       |
//! | `AudioEngineFactory` | required                       | required          |
//! | `Clock`              | `SystemClock`                  | `SystemClock`     |
//!
//! ## Example
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .audio_engine_factory(host_engine_factory)
//!     .load_timeout(Duration::from_secs(20))
//!     .build()
//!     .await?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AudioEngineFactory, Clock, FileSystemAccess, HttpClient, SettingsStore, SystemClock,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_AUDIO_API_BASE: &str = "https://quranapi.pages.dev/api/audio";
pub const DEFAULT_TEXT_API_BASE: &str = "https://api.alquran.cloud/v1";
pub const DEFAULT_TRANSLATION_CODE: &str = "en.asad";
pub const DEFAULT_CACHE_DIR_NAME: &str = "quran-audio";
pub const DEFAULT_CHAPTER_COUNT: u32 = 114;

/// Remote catalog endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Base of the audio index; `{base}/{chapter}.json` is requested.
    pub audio_api_base: String,
    /// Base of the text API; `{base}/surah/{chapter}` is requested.
    pub text_api_base: String,
    pub translation_code: String,
    /// Timeout applied to catalog and text requests.
    pub request_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            audio_api_base: DEFAULT_AUDIO_API_BASE.to_string(),
            text_api_base: DEFAULT_TEXT_API_BASE.to_string(),
            translation_code: DEFAULT_TRANSLATION_CODE.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("audio_api_base", &self.audio_api_base),
            ("text_api_base", &self.text_api_base),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is not a valid URL: {}", name, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{} must use http or https, got '{}'",
                    name,
                    parsed.scheme()
                )));
            }
        }

        if self.translation_code.trim().is_empty() {
            return Err(Error::Config("Translation code cannot be empty".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Catalog request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Bounded waits and polling cadences used by playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTimings {
    /// Upper bound for a freshly created engine to report "loaded".
    pub load_timeout: Duration,
    /// Upper bound `play` waits for an engine that is not yet ready.
    pub play_ready_timeout: Duration,
    /// Interval between readiness checks during the two waits above.
    pub ready_poll_interval: Duration,
    /// Interval of the status poller that reports position.
    pub status_poll_interval: Duration,
    /// Interval at which the sleep timer re-evaluates its deadline.
    pub sleep_tick_interval: Duration,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
            play_ready_timeout: Duration::from_secs(5),
            ready_poll_interval: Duration::from_millis(100),
            status_poll_interval: Duration::from_secs(1),
            sleep_tick_interval: Duration::from_secs(1),
        }
    }
}

impl PlaybackTimings {
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("load_timeout", self.load_timeout),
            ("play_ready_timeout", self.play_ready_timeout),
            ("ready_poll_interval", self.ready_poll_interval),
            ("status_poll_interval", self.status_poll_interval),
            ("sleep_tick_interval", self.sleep_tick_interval),
        ];
        if let Some((name, _)) = all.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::Config(format!("{} must be greater than 0", name)));
        }

        if self.ready_poll_interval > self.load_timeout
            || self.ready_poll_interval > self.play_ready_timeout
        {
            return Err(Error::Config(
                "ready_poll_interval cannot exceed the waits it polls for".to_string(),
            ));
        }

        Ok(())
    }
}

/// Fully assembled configuration.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub audio_engine_factory: Arc<dyn AudioEngineFactory>,
    pub clock: Arc<dyn Clock>,

    pub catalog: CatalogConfig,
    pub timings: PlaybackTimings,
    /// Subdirectory of the host cache directory holding audio files.
    pub cache_dir_name: String,
    /// Number of items (chapters); navigation is bounded to `1..=chapter_count`.
    pub chapter_count: u32,
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("audio_engine_factory", &"AudioEngineFactory { ... }")
            .field("catalog", &self.catalog)
            .field("timings", &self.timings)
            .field("cache_dir_name", &self.cache_dir_name)
            .field("chapter_count", &self.chapter_count)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.catalog.validate()?;
        self.timings.validate()?;

        let name = self.cache_dir_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(Error::Config(format!(
                "Cache directory name must be a single path segment, got '{}'",
                self.cache_dir_name
            )));
        }

        if self.chapter_count == 0 {
            return Err(Error::Config(
                "Chapter count must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn missing(capability: &str, hint: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: hint.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    // No overall timeout: audio transfers can be long. Catalog and text
    // requests carry their own per-request timeout.
    let client = bridge_desktop::ReqwestHttpClient::for_downloads().map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(missing(
        "HttpClient",
        "An HTTP client is required for catalog lookups and audio downloads. \
         Desktop: enable the 'desktop-shims' feature. \
         Mobile: inject a platform-native adapter.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    let fs: Arc<dyn FileSystemAccess> = Arc::new(bridge_desktop::TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(missing(
        "FileSystemAccess",
        "File system access is required for the audio cache. \
         Desktop: enable the 'desktop-shims' feature. \
         Mobile: inject an adapter rooted in the app document directory.",
    ))
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_settings_store(
    file_system: &Arc<dyn FileSystemAccess>,
) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;

    let data_dir = file_system.get_data_directory().await.map_err(|e| {
        Error::Internal(format!("Failed to resolve data directory for settings: {}", e))
    })?;

    let store = SqliteSettingsStore::new(data_dir.join("settings.db"))
        .await
        .map_err(|e| {
            Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
        })?;

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_settings_store(
    _file_system: &Arc<dyn FileSystemAccess>,
) -> Result<Arc<dyn SettingsStore>> {
    Err(missing(
        "SettingsStore",
        "A settings store is required to persist the selected reciter. \
         Desktop: enable the 'desktop-shims' feature. \
         Mobile: inject UserDefaults/DataStore.",
    ))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    audio_engine_factory: Option<Arc<dyn AudioEngineFactory>>,
    clock: Option<Arc<dyn Clock>>,
    catalog: CatalogConfig,
    timings: PlaybackTimings,
    cache_dir_name: Option<String>,
    chapter_count: Option<u32>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn audio_engine_factory(mut self, factory: Arc<dyn AudioEngineFactory>) -> Self {
        self.audio_engine_factory = Some(factory);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn catalog(mut self, catalog: CatalogConfig) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn audio_api_base(mut self, base: impl Into<String>) -> Self {
        self.catalog.audio_api_base = base.into();
        self
    }

    pub fn text_api_base(mut self, base: impl Into<String>) -> Self {
        self.catalog.text_api_base = base.into();
        self
    }

    pub fn translation_code(mut self, code: impl Into<String>) -> Self {
        self.catalog.translation_code = code.into();
        self
    }

    pub fn timings(mut self, timings: PlaybackTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.timings.load_timeout = timeout;
        self
    }

    pub fn play_ready_timeout(mut self, timeout: Duration) -> Self {
        self.timings.play_ready_timeout = timeout;
        self
    }

    pub fn status_poll_interval(mut self, interval: Duration) -> Self {
        self.timings.status_poll_interval = interval;
        self
    }

    pub fn cache_dir_name(mut self, name: impl Into<String>) -> Self {
        self.cache_dir_name = Some(name.into());
        self
    }

    pub fn chapter_count(mut self, count: u32) -> Self {
        self.chapter_count = Some(count);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Resolve defaults, check required capabilities and validate.
    pub async fn build(self) -> Result<CoreConfig> {
        let audio_engine_factory = self.audio_engine_factory.ok_or_else(|| {
            missing(
                "AudioEngineFactory",
                "The host must provide its native audio player through an \
                 AudioEngineFactory; no default implementation exists.",
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&file_system).await?,
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let config = CoreConfig {
            http_client,
            file_system,
            settings_store,
            audio_engine_factory,
            clock,
            catalog: self.catalog,
            timings: self.timings,
            cache_dir_name: self
                .cache_dir_name
                .unwrap_or_else(|| DEFAULT_CACHE_DIR_NAME.to_string()),
            chapter_count: self.chapter_count.unwrap_or(DEFAULT_CHAPTER_COUNT),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse, HttpStream};
    use bridge_traits::storage::FileMetadata;
    use bridge_traits::{AudioEngine, AudioSource, BridgeError};
    use bytes::Bytes;
    use std::path::{Path, PathBuf};
    use tokio::io::AsyncWrite;

    struct NoopEngineFactory;

    #[async_trait]
    impl AudioEngineFactory for NoopEngineFactory {
        async fn create(&self, _source: &AudioSource) -> BridgeResult<Box<dyn AudioEngine>> {
            Err(BridgeError::NotAvailable("test".into()))
        }
    }

    struct NoopHttp;

    #[async_trait]
    impl HttpClient for NoopHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::NotAvailable("test".into()))
        }

        async fn open_stream(&self, _request: HttpRequest) -> BridgeResult<HttpStream> {
            Err(BridgeError::NotAvailable("test".into()))
        }
    }

    struct NoopFs;

    #[async_trait]
    impl FileSystemAccess for NoopFs {
        async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
            Ok(PathBuf::from("/cache"))
        }
        async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
            Ok(PathBuf::from("/data"))
        }
        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            Err(BridgeError::NotAvailable("test".into()))
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn rename(&self, _from: &Path, _to: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_directory(&self, _path: &Path) -> BridgeResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }
        async fn open_write_stream(
            &self,
            _path: &Path,
        ) -> BridgeResult<Box<dyn AsyncWrite + Send + Unpin>> {
            Ok(Box::new(tokio::io::sink()))
        }
        async fn open_append_stream(
            &self,
            _path: &Path,
        ) -> BridgeResult<Box<dyn AsyncWrite + Send + Unpin>> {
            Ok(Box::new(tokio::io::sink()))
        }
    }

    struct NoopSettings;

    #[async_trait]
    impl SettingsStore for NoopSettings {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
    }

    fn injected() -> CoreConfigBuilder {
        CoreConfig::builder()
            .http_client(Arc::new(NoopHttp))
            .file_system(Arc::new(NoopFs))
            .settings_store(Arc::new(NoopSettings))
            .audio_engine_factory(Arc::new(NoopEngineFactory))
    }

    #[tokio::test]
    async fn test_build_with_injected_bridges_uses_defaults() {
        let config = injected().build().await.unwrap();

        assert_eq!(config.catalog.audio_api_base, DEFAULT_AUDIO_API_BASE);
        assert_eq!(config.catalog.text_api_base, DEFAULT_TEXT_API_BASE);
        assert_eq!(config.cache_dir_name, "quran-audio");
        assert_eq!(config.chapter_count, 114);
        assert_eq!(config.timings.load_timeout, Duration::from_secs(30));
        assert_eq!(config.timings.ready_poll_interval, Duration::from_millis(100));
        assert!(format!("{:?}", config).contains("chapter_count: 114"));
    }

    #[tokio::test]
    async fn test_missing_engine_factory_fails_fast() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(NoopHttp))
            .file_system(Arc::new(NoopFs))
            .settings_store(Arc::new(NoopSettings))
            .build()
            .await;

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioEngineFactory")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let bad_url = injected().audio_api_base("ftp://example.com").build().await;
        assert!(matches!(bad_url, Err(Error::Config(_))));

        let zero_chapters = injected().chapter_count(0).build().await;
        assert!(matches!(zero_chapters, Err(Error::Config(_))));

        let nested_dir = injected().cache_dir_name("a/b").build().await;
        assert!(matches!(nested_dir, Err(Error::Config(_))));

        let zero_timeout = injected().load_timeout(Duration::ZERO).build().await;
        assert!(matches!(zero_timeout, Err(Error::Config(_))));
    }

    #[test]
    fn test_poll_interval_cannot_exceed_waits() {
        let timings = PlaybackTimings {
            ready_poll_interval: Duration::from_secs(10),
            ..PlaybackTimings::default()
        };
        assert!(timings.validate().is_err());
        assert!(PlaybackTimings::default().validate().is_ok());
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_build_with_desktop_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fs: Arc<dyn FileSystemAccess> = Arc::new(bridge_desktop::TokioFileSystem::with_directories(
            dir.path().join("cache"),
            dir.path().join("data"),
        ));

        let config = CoreConfig::builder()
            .file_system(fs)
            .audio_engine_factory(Arc::new(NoopEngineFactory))
            .build()
            .await
            .unwrap();

        config
            .settings_store
            .set_string("selected_reciter", "dosari")
            .await
            .unwrap();
        assert_eq!(
            config
                .settings_store
                .get_string("selected_reciter")
                .await
                .unwrap()
                .as_deref(),
            Some("dosari")
        );
        assert!(dir.path().join("data").join("settings.db").exists());
    }
}
