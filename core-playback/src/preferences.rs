//! Persisted reciter choice.

use bridge_traits::storage::SettingsStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::reciters::{self, DEFAULT_RECITER_ID};

pub const SELECTED_RECITER_KEY: &str = "selected_reciter";

/// Reads and writes the selected reciter. Storage failures are logged and
/// never surfaced: the app keeps working with the default or in-memory choice.
pub struct ReciterPreference {
    store: Arc<dyn SettingsStore>,
}

impl ReciterPreference {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Stored reciter id, or the default when absent, empty or unreadable.
    pub async fn load(&self) -> String {
        match self.store.get_string(SELECTED_RECITER_KEY).await {
            Ok(Some(id)) if !id.trim().is_empty() => {
                if !reciters::is_known(&id) {
                    warn!("Stored reciter {:?} is not in the reciter table", id);
                }
                debug!(reciter = %id, "Loaded reciter preference");
                id
            }
            Ok(_) => DEFAULT_RECITER_ID.to_string(),
            Err(e) => {
                error!("Failed to load reciter preference: {}", e);
                DEFAULT_RECITER_ID.to_string()
            }
        }
    }

    pub async fn save(&self, reciter: &str) {
        if let Err(e) = self.store.set_string(SELECTED_RECITER_KEY, reciter).await {
            error!("Failed to save reciter preference: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteSettingsStore;

    #[tokio::test]
    async fn test_defaults_then_persists() {
        let store = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
        let preference = ReciterPreference::new(store.clone());

        assert_eq!(preference.load().await, "mishary");

        preference.save("qatami").await;
        assert_eq!(preference.load().await, "qatami");
        assert_eq!(
            store.get_string(SELECTED_RECITER_KEY).await.unwrap().as_deref(),
            Some("qatami")
        );
    }

    #[tokio::test]
    async fn test_blank_value_falls_back_to_default() {
        let store = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
        store.set_string(SELECTED_RECITER_KEY, "  ").await.unwrap();

        let preference = ReciterPreference::new(store);
        assert_eq!(preference.load().await, DEFAULT_RECITER_ID);
    }
}
