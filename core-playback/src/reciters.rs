//! Reciter table.
//!
//! Maps the ids used across the core (cache keys, persisted preference) to the
//! numeric keys of the remote audio index.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reciter {
    pub id: &'static str,
    pub name: &'static str,
    /// Key of this reciter in the audio index JSON.
    pub catalog_key: &'static str,
}

pub const DEFAULT_RECITER_ID: &str = "mishary";

/// Index key used for ids missing from [`RECITERS`].
pub const FALLBACK_CATALOG_KEY: &str = "1";

pub const UNKNOWN_RECITER_NAME: &str = "Unknown";

pub const RECITERS: &[Reciter] = &[
    Reciter {
        id: "mishary",
        name: "Mishary Rashid Al-Afasy",
        catalog_key: "1",
    },
    Reciter {
        id: "shatri",
        name: "Abu Bakr Al-Shatri",
        catalog_key: "2",
    },
    Reciter {
        id: "qatami",
        name: "Nasser Al-Qatami",
        catalog_key: "3",
    },
    Reciter {
        id: "dosari",
        name: "Yasser Al-Dosari",
        catalog_key: "4",
    },
];

pub fn find(id: &str) -> Option<&'static Reciter> {
    RECITERS.iter().find(|r| r.id == id)
}

/// Audio index key for `id`; unknown ids fall back to the default reciter's key.
pub fn catalog_key(id: &str) -> &'static str {
    find(id).map_or(FALLBACK_CATALOG_KEY, |r| r.catalog_key)
}

pub fn display_name(id: &str) -> &'static str {
    find(id).map_or(UNKNOWN_RECITER_NAME, |r| r.name)
}

pub fn is_known(id: &str) -> bool {
    find(id).is_some()
}
