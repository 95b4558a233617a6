//! Per-player cache storage.

use crate::Result;
use crate::storage::CacheRecord;

/// Stores one [`CacheRecord`] per player key.
///
/// Keys are either a player's stable UUID or, for records written by older
/// versions, the player's display name.
pub trait CacheStore: Send + Sync {
    /// Returns `true` if a record is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Loads the record stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing (or an empty document) is stored.
    fn load(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Stores `record` under `key`, replacing any previous record.
    fn save(&self, key: &str, record: &CacheRecord) -> Result<()>;
}
