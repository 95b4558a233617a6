//! [`QueryPort`] over a `SQLite` database.

use super::connection::{acquire_lock, configure_connection, quote_identifier};
use crate::storage::traits::QueryPort;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

/// Schema lookups against a `SQLite` database.
///
/// Holds a single connection behind a mutex; lookups are short and run only
/// during validation.
pub struct SqliteQueryPort {
    conn: Mutex<Connection>,
}

impl SqliteQueryPort {
    /// Opens a database file for read-only lookups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        if !configure_connection(&conn) {
            tracing::debug!(path = %path.display(), "Using a partially configured connection");
        }
        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn count(&self, operation: &str, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
        let conn = acquire_lock(&self.conn);
        metrics::counter!("sqlite_lookups_total", "operation" => operation.to_string())
            .increment(1);
        conn.query_row(sql, params, |row| row.get::<_, i64>(0))
            .optional()
            .map(Option::unwrap_or_default)
            .map_err(|e| Error::OperationFailed {
                operation: operation.to_string(),
                cause: e.to_string(),
            })
    }
}

impl std::fmt::Debug for SqliteQueryPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteQueryPort").finish_non_exhaustive()
    }
}

impl QueryPort for SqliteQueryPort {
    fn table_exists(&self, table: &str) -> Result<bool> {
        let n = self.count(
            "table_exists",
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            params![table],
        )?;
        Ok(n > 0)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let n = self.count(
            "column_exists",
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
        )?;
        Ok(n > 0)
    }

    fn count_rows_with_value(&self, table: &str, column: &str, value: &str) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote_identifier(table),
            quote_identifier(column)
        );
        let n = self.count("count_rows_with_value", &sql, params![value])?;
        Ok(u64::try_from(n).unwrap_or_default())
    }
}
