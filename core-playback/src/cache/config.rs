//! Cache configuration and validity bounds

/// Smallest file accepted as real audio (10 KiB).
pub const DEFAULT_MIN_VALID_BYTES: u64 = 10 * 1024;

/// Largest file accepted as a single chapter recitation (50 MiB).
pub const DEFAULT_MAX_VALID_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for the recitation cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Files below this size are treated as corrupt (default: 10 KiB)
    pub min_valid_bytes: u64,

    /// Files above this size are treated as corrupt (default: 50 MiB)
    pub max_valid_bytes: u64,

    /// Directory name under the host cache directory
    pub directory_name: String,

    /// Extension of cached files, without the dot
    pub file_extension: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_valid_bytes: DEFAULT_MIN_VALID_BYTES,
            max_valid_bytes: DEFAULT_MAX_VALID_BYTES,
            directory_name: core_runtime::config::DEFAULT_CACHE_DIR_NAME.to_string(),
            file_extension: "mp3".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accepted size range, inclusive on both ends.
    pub fn with_size_bounds(mut self, min_bytes: u64, max_bytes: u64) -> Self {
        self.min_valid_bytes = min_bytes;
        self.max_valid_bytes = max_bytes;
        self
    }

    pub fn with_directory_name(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    /// Whether a file of `size` bytes is a usable cache entry.
    pub fn is_valid_size(&self, size: u64) -> bool {
        size >= self.min_valid_bytes && size <= self.max_valid_bytes
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_valid_bytes == 0 {
            return Err("min_valid_bytes must be greater than 0".to_string());
        }

        if self.max_valid_bytes < self.min_valid_bytes {
            return Err("max_valid_bytes must not be below min_valid_bytes".to_string());
        }

        if self.directory_name.is_empty() {
            return Err("directory_name cannot be empty".to_string());
        }

        if self.directory_name.contains(['/', '\\']) || self.directory_name == ".." {
            return Err("directory_name must be a single path component".to_string());
        }

        if self.file_extension.is_empty() || self.file_extension.starts_with('.') {
            return Err("file_extension must be non-empty and given without a dot".to_string());
        }

        Ok(())
    }
}
