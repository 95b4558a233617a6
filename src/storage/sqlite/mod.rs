//! `SQLite` access for schema validation.

mod connection;
mod query;

pub use connection::{acquire_lock, configure_connection, quote_identifier};
pub use query::SqliteQueryPort;
