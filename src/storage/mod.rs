//! Storage layer.
//!
//! Two ports connect the bridge to storage it does not own:
//! - **Query**: schema and row lookups against the web application's database
//!   ([`QueryPort`], with [`SqliteQueryPort`] for local databases)
//! - **Cache**: one record per player on local disk ([`CacheStore`], with
//!   [`FilesystemCacheStore`])

// Allow significant_drop_tightening - holding the connection guard for the
// length of one lookup is intended.
#![allow(clippy::significant_drop_tightening)]

mod filesystem;
mod record;
pub mod sqlite;
pub mod traits;

pub use filesystem::FilesystemCacheStore;
pub use record::{CacheRecord, RecordValue};
pub use sqlite::SqliteQueryPort;
pub use traits::{CacheStore, QueryPort};
