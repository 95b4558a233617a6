//! Filesystem-based player cache.
//!
//! One YAML file per player, named `<key>.yml`, in a single directory.
//!
//! # Security
//!
//! - **Path traversal**: keys are validated so a record can never be written
//!   outside the cache directory
//! - **File size limits**: oversized records are refused before reading

use crate::storage::traits::CacheStore;
use crate::storage::CacheRecord;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum size of a cache record (256KB).
const MAX_FILE_SIZE: u64 = 256 * 1024;

/// Filesystem-based player cache.
#[derive(Debug, Clone)]
pub struct FilesystemCacheStore {
    base_path: PathBuf,
}

impl FilesystemCacheStore {
    /// Creates a cache rooted at `base_path`. The directory is created on
    /// first save.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Creates a cache and makes sure its directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created or the path
    /// exists but is not a directory.
    pub fn with_create(base_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(base_path);
        store.ensure_directory()?;
        Ok(store)
    }

    /// Creates the cache directory if needed. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created or the path
    /// exists but is not a directory.
    pub fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).map_err(|e| Error::Io {
            operation: "create_cache_dir".to_string(),
            cause: format!("{}: {e}", self.base_path.display()),
        })?;
        if !self.base_path.is_dir() {
            return Err(Error::Io {
                operation: "create_cache_dir".to_string(),
                cause: format!("{} is not a directory", self.base_path.display()),
            });
        }
        Ok(())
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the file path for a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the key is not a safe file name.
    pub fn record_path(&self, key: &str) -> Result<PathBuf> {
        if !Self::is_safe_key(key) {
            return Err(Error::InvalidInput(format!(
                "cache key contains invalid characters: {key}"
            )));
        }
        Ok(self.base_path.join(format!("{key}.yml")))
    }

    /// Only alphanumerics, dash and underscore; this covers UUIDs and
    /// player names.
    fn is_safe_key(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= 64
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl CacheStore for FilesystemCacheStore {
    /// A key that cannot name a file was never saved, so it does not exist.
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(Self::is_safe_key(key) && self.record_path(key)?.is_file())
    }

    /// A key that cannot name a file loads as absent; only `save` rejects it.
    fn load(&self, key: &str) -> Result<Option<CacheRecord>> {
        if !Self::is_safe_key(key) {
            tracing::debug!(key = %key, "Cache key cannot name a file, treating record as absent");
            return Ok(None);
        }
        let path = self.record_path(key)?;
        if !path.is_file() {
            return Ok(None);
        }

        let metadata = fs::metadata(&path).map_err(|e| Error::Io {
            operation: "read_cache_metadata".to_string(),
            cause: e.to_string(),
        })?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::InvalidInput(format!(
                "cache record exceeds maximum size of {MAX_FILE_SIZE} bytes: {}",
                path.display()
            )));
        }

        let text = fs::read_to_string(&path).map_err(|e| Error::Io {
            operation: "read_cache_record".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let record = CacheRecord::from_yaml_str(&text)?;
        Ok(Some(record).filter(|r| !r.is_empty()))
    }

    fn save(&self, key: &str, record: &CacheRecord) -> Result<()> {
        let path = self.record_path(key)?;
        self.ensure_directory()?;
        let yaml = record.to_yaml_string()?;
        fs::write(&path, yaml).map_err(|e| Error::Io {
            operation: "write_cache_record".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        metrics::counter!("cache_records_written_total").increment(1);
        Ok(())
    }
}
