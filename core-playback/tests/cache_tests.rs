//! Cache store behaviour against the real tokio file system.

use bridge_desktop::TokioFileSystem;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_playback::cache::{CacheConfig, CacheStore};
use std::sync::Arc;

fn setup() -> (tempfile::TempDir, Arc<TokioFileSystem>, CacheStore) {
    let dir = tempfile::tempdir().unwrap();
    let fs = Arc::new(TokioFileSystem::with_directories(
        dir.path().join("cache"),
        dir.path().join("data"),
    ));
    let store = CacheStore::new(CacheConfig::default(), fs.clone(), dir.path().join("quran-audio"))
        .unwrap();
    (dir, fs, store)
}

#[tokio::test]
async fn test_one_byte_file_is_purged_on_exists() {
    let (_dir, fs, store) = setup();
    let path = store.path_for(2, "mishary");
    fs.write_file(&path, Bytes::from_static(b"x")).await.unwrap();

    assert!(!store.exists(2, "mishary").await);
    assert!(!path.exists());

    // Second check sees the same clean state.
    assert!(!store.exists(2, "mishary").await);
}

#[tokio::test]
async fn test_valid_file_is_reported_present() {
    let (_dir, fs, store) = setup();
    let path = store.path_for(36, "shatri");
    fs.write_file(&path, Bytes::from(vec![0u8; 64 * 1024]))
        .await
        .unwrap();

    assert!(store.exists(36, "shatri").await);
    assert!(path.exists());

    let entry = store.inspect(36, "shatri").await;
    assert!(entry.exists_on_disk);
    assert_eq!(entry.size_bytes, 64 * 1024);
    assert!(entry.is_valid(store.config()));
}

#[tokio::test]
async fn test_missing_file_is_absent() {
    let (_dir, _fs, store) = setup();
    assert!(!store.exists(114, "dosari").await);
    assert!(!store.inspect(114, "dosari").await.exists_on_disk);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (_dir, fs, store) = setup();

    store.delete(1, "qatami").await;
    store.delete(1, "qatami").await;

    let path = store.path_for(1, "qatami");
    fs.write_file(&path, Bytes::from(vec![0u8; 20 * 1024]))
        .await
        .unwrap();
    store.delete(1, "qatami").await;
    assert!(!path.exists());
    store.delete(1, "qatami").await;
}

#[tokio::test]
async fn test_clear_all_removes_directory() {
    let (_dir, fs, store) = setup();
    for chapter in 1..=3 {
        fs.write_file(
            &store.path_for(chapter, "mishary"),
            Bytes::from(vec![0u8; 16 * 1024]),
        )
        .await
        .unwrap();
    }
    assert_eq!(store.usage().await.file_count, 3);

    store.clear_all().await.unwrap();
    assert!(!store.root().exists());
    assert_eq!(store.usage().await.file_count, 0);

    // Clearing an already empty cache is not an error.
    store.clear_all().await.unwrap();
}

#[tokio::test]
async fn test_open_uses_host_cache_directory() {
    let dir = tempfile::tempdir().unwrap();
    let fs = Arc::new(TokioFileSystem::with_directories(
        dir.path().join("cache"),
        dir.path().join("data"),
    ));

    let store = CacheStore::open(CacheConfig::default(), fs).await.unwrap();
    assert_eq!(store.root(), dir.path().join("cache").join("quran-audio"));
}
