//! Individual table, column and row checks.
//!
//! Hard checks ([`Checker::check_table`], [`Checker::check_column`]) fail the
//! overall result. Soft checks ([`Checker::check_key`]) only warn.

use super::{Severity, ValidationEntry};
use crate::Error;
use crate::storage::QueryPort;

/// Runs checks against a [`QueryPort`] and records what it finds.
pub struct Checker<'a> {
    port: &'a dyn QueryPort,
    passed: bool,
    entries: Vec<ValidationEntry>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(port: &'a dyn QueryPort) -> Self {
        Self {
            port,
            passed: true,
            entries: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> (bool, Vec<ValidationEntry>) {
        (self.passed, self.entries)
    }

    /// Records a severe entry.
    pub fn severe(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.entries.push(ValidationEntry::new(Severity::Severe, message));
    }

    /// Records a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.entries.push(ValidationEntry::new(Severity::Warning, message));
    }

    /// Records a severe entry and fails the overall result.
    fn fail(&mut self, setting: &str, cause: String) -> bool {
        self.passed = false;
        self.severe(
            Error::Validation {
                setting: setting.to_string(),
                cause,
            }
            .to_string(),
        );
        false
    }

    /// Checks that `table` exists.
    pub fn check_table(&mut self, setting: &str, table: &str) -> bool {
        metrics::counter!("validation_checks_total", "kind" => "table").increment(1);
        if table.is_empty() {
            return self.fail(setting, "empty table name".to_string());
        }
        match self.port.table_exists(table) {
            Ok(true) => true,
            Ok(false) => self.fail(setting, format!("table '{table}' does not exist")),
            Err(e) => self.fail(setting, format!("checking table '{table}': {e}")),
        }
    }

    /// Checks that `column` exists in `table`.
    pub fn check_column(&mut self, setting: &str, table: &str, column: &str) -> bool {
        metrics::counter!("validation_checks_total", "kind" => "column").increment(1);
        if column.is_empty() {
            return self.fail(setting, format!("empty column name for table '{table}'"));
        }
        match self.port.column_exists(table, column) {
            Ok(true) => true,
            Ok(false) => self.fail(
                setting,
                format!("column '{column}' does not exist in table '{table}'"),
            ),
            Err(e) => self.fail(
                setting,
                format!("checking column '{column}' in table '{table}': {e}"),
            ),
        }
    }

    /// Checks a table and then, if it exists, every column in `columns`.
    ///
    /// Every column is checked even after one fails, so all problems are
    /// reported in one pass.
    pub fn check_table_columns<K, C>(
        &mut self,
        table_setting: &str,
        table: &str,
        columns: &[(K, C)],
    ) -> bool
    where
        K: AsRef<str>,
        C: AsRef<str>,
    {
        if !self.check_table(table_setting, table) {
            return false;
        }
        columns.iter().fold(true, |ok, (setting, column)| {
            self.check_column(setting.as_ref(), table, column.as_ref()) && ok
        })
    }

    /// Warns if no row of `table` has `key` in `key_column`.
    pub fn check_key(&mut self, setting: &str, table: &str, key_column: &str, key: &str) {
        metrics::counter!("validation_checks_total", "kind" => "key").increment(1);
        match self.port.count_rows_with_value(table, key_column, key) {
            Ok(0) => self.warn(format!(
                "There are no rows containing '{key}' in the '{key_column}' column of the '{table}' table ({setting})"
            )),
            Ok(_) => {},
            Err(e) => self.severe(format!("Error while checking '{setting}': {e}")),
        }
    }

    /// Checks that the super-user's ID is set and present in the linking
    /// table.
    pub fn check_super_user(&mut self, table: &str, user_id_column: &str, user_id: &str) -> bool {
        metrics::counter!("validation_checks_total", "kind" => "super_user").increment(1);
        if user_id.is_empty() {
            self.severe("The super-user's user ID setting is not set");
            return false;
        }
        match self.port.row_with_value_exists(table, user_id_column, user_id) {
            Ok(true) => true,
            Ok(false) => {
                self.severe(format!(
                    "The super-user's user ID '{user_id}' was not found in '{table}.{user_id_column}'"
                ));
                false
            },
            Err(e) => {
                self.severe(format!("Error while checking super user user id: {e}"));
                false
            },
        }
    }
}
