//! Shared connection handling for `SQLite`.

use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a lookup waits on a locked database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Acquires a mutex lock, recovering from poison.
///
/// A panic while the connection was held leaves it usable for read-only
/// lookups, so the poison is logged and cleared.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for short read-only lookups.
///
/// A setting that fails is logged and skipped; an unconfigured connection
/// still answers schema queries. Returns `true` if every setting applied.
pub fn configure_connection(conn: &Connection) -> bool {
    let busy = conn
        .busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| tracing::debug!(error = %e, "SQLite busy timeout not applied"))
        .is_ok();
    let read_only = conn
        .pragma_update(None, "query_only", "ON")
        .map_err(|e| tracing::debug!(error = %e, "SQLite query_only pragma not applied"))
        .is_ok();
    busy && read_only
}

/// Quotes an identifier for interpolation into SQL.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
