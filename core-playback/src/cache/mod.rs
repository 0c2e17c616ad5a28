//! # Recitation Audio Cache
//!
//! Content-addressed storage of downloaded recitations on the local file
//! system, keyed by `(chapter, reciter)`.
//!
//! ## Overview
//!
//! - One `.mp3` file per key under a fixed app-private directory; the path is
//!   derived from the key and never stored.
//! - A file counts as present only while its size is inside the configured
//!   validity range. Files failing that check are deleted on sight.
//! - No automatic eviction. Entries leave the cache through
//!   [`CacheStore::delete`] or [`CacheStore::clear_all`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, CacheStore};
//!
//! # async fn example(store: &CacheStore) {
//! if store.exists(1, "mishary").await {
//!     let path = store.path_for(1, "mishary");
//!     println!("cached at {}", path.display());
//! }
//! # }
//! ```

pub mod config;
pub mod store;

pub use config::CacheConfig;
pub use store::{CacheEntry, CacheKey, CacheStore, CacheUsage};
