//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux), used for development builds and integration tests:
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! The audio engine is always host-provided and has no desktop default.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let fs = TokioFileSystem::new();
//!     let settings = SqliteSettingsStore::in_memory().await.unwrap();
//! }
//! ```

mod filesystem;
mod http;
mod settings;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
