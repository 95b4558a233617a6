//! Schema and row lookups against the web application's database.

use crate::Result;

/// Read-only lookups used to validate feature bindings.
///
/// Implementations must quote identifiers themselves; callers pass table and
/// column names straight from the configuration.
pub trait QueryPort: Send + Sync {
    /// Returns `true` if the table exists.
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Returns `true` if the column exists in the table.
    fn column_exists(&self, table: &str, column: &str) -> Result<bool>;

    /// Counts rows whose `column` equals `value`.
    fn count_rows_with_value(&self, table: &str, column: &str, value: &str) -> Result<u64>;

    /// Returns `true` if at least one row has `column` equal to `value`.
    fn row_with_value_exists(&self, table: &str, column: &str, value: &str) -> Result<bool> {
        Ok(self.count_rows_with_value(table, column, value)? > 0)
    }
}
