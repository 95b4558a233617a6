//! Where each feature's data lives in the web application's database.

/// A table plus the column that identifies the web application user.
///
/// Features stored as key-value rows also name the key column, the value
/// column and the key that selects their row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableBinding {
    /// Table name.
    pub table: String,
    /// Column holding the web application user ID.
    pub user_id_column: String,
    /// Column holding row keys, for key-value storage.
    pub key_column: Option<String>,
    /// Column holding row values, for key-value storage.
    pub value_column: Option<String>,
    /// Key selecting this feature's row, for key-value storage.
    pub key_name: Option<String>,
}

impl TableBinding {
    /// Creates a direct-column binding.
    #[must_use]
    pub fn new(table: impl Into<String>, user_id_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            user_id_column: user_id_column.into(),
            ..Self::default()
        }
    }

    /// Adds the key column.
    #[must_use]
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    /// Adds the value column.
    #[must_use]
    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = Some(column.into());
        self
    }

    /// Adds the key name.
    #[must_use]
    pub fn with_key_name(mut self, key: impl Into<String>) -> Self {
        self.key_name = Some(key.into());
        self
    }

    /// Returns `true` if the binding uses key-value rows.
    #[must_use]
    pub const fn uses_key(&self) -> bool {
        self.key_column.is_some()
    }

    /// Key column, or an empty string when unset.
    #[must_use]
    pub fn key_column_or_empty(&self) -> &str {
        self.key_column.as_deref().unwrap_or_default()
    }

    /// Value column, or an empty string when unset.
    #[must_use]
    pub fn value_column_or_empty(&self) -> &str {
        self.value_column.as_deref().unwrap_or_default()
    }

    /// Key name, or an empty string when unset.
    #[must_use]
    pub fn key_name_or_empty(&self) -> &str {
        self.key_name.as_deref().unwrap_or_default()
    }
}

/// Where one statistics tracker writes its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerBinding {
    /// The value has its own column in the statistics table.
    DirectColumn {
        /// Column for the raw value.
        column: String,
        /// Optional column for a human-readable rendering.
        formatted_column: Option<String>,
    },
    /// The value is a row in the shared key/value columns.
    KeyValue {
        /// Key for the raw value.
        key_name: String,
        /// Optional key for a human-readable rendering.
        formatted_key_name: Option<String>,
    },
}

impl TrackerBinding {
    /// Builds a binding for the given encoding. An empty formatted name
    /// means "no companion".
    #[must_use]
    pub fn for_encoding(uses_key: bool, name: String, formatted: String) -> Self {
        let formatted = Some(formatted).filter(|f| !f.is_empty());
        if uses_key {
            Self::KeyValue {
                key_name: name,
                formatted_key_name: formatted,
            }
        } else {
            Self::DirectColumn {
                column: name,
                formatted_column: formatted,
            }
        }
    }

    /// Column or key name of the raw value.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::DirectColumn { column, .. } => column,
            Self::KeyValue { key_name, .. } => key_name,
        }
    }

    /// Column or key name of the formatted companion, if configured.
    #[must_use]
    pub fn formatted_name(&self) -> Option<&str> {
        match self {
            Self::DirectColumn {
                formatted_column, ..
            } => formatted_column.as_deref(),
            Self::KeyValue {
                formatted_key_name, ..
            } => formatted_key_name.as_deref(),
        }
    }
}

/// How the statistics row is created on first contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMethod {
    /// Plain insert of the user ID.
    #[default]
    Generic,
    /// SMF-style insert that also writes a theme ID.
    Smf,
}

impl InsertMethod {
    /// Matches a method name by prefix (`gen...`, `smf...`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.starts_with("gen") {
            Some(Self::Generic)
        } else if s.starts_with("smf") {
            Some(Self::Smf)
        } else {
            None
        }
    }
}

/// How secondary group IDs are stored by the web application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecondaryGroupStorage {
    /// One row per membership in a junction table.
    #[default]
    JunctionTable,
    /// All IDs in one delimited column.
    SingleColumn,
    /// All IDs in one delimited value of a key-value row.
    KeyValue,
    /// One key-value row per membership.
    MultipleKeyValue,
}

impl SecondaryGroupStorage {
    /// Matches a storage method by prefix (`jun...`/`tab...`, `sin...`,
    /// `key...`, `mul...`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.starts_with("mul") {
            Some(Self::MultipleKeyValue)
        } else if s.starts_with("key") {
            Some(Self::KeyValue)
        } else if s.starts_with("sin") {
            Some(Self::SingleColumn)
        } else if s.starts_with("jun") || s.starts_with("tab") {
            Some(Self::JunctionTable)
        } else {
            None
        }
    }

    /// Returns `true` if rows are selected by a key name.
    #[must_use]
    pub const fn uses_key(self) -> bool {
        matches!(self, Self::KeyValue | Self::MultipleKeyValue)
    }

    /// Returns `true` if IDs are packed into one delimited value.
    #[must_use]
    pub const fn uses_delimiter(self) -> bool {
        matches!(self, Self::SingleColumn | Self::KeyValue)
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JunctionTable => "junction",
            Self::SingleColumn => "single-column",
            Self::KeyValue => "key-value",
            Self::MultipleKeyValue => "multiple-key-value",
        }
    }
}

/// How bans are recorded by the web application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BanMethod {
    /// Rows in a ban table.
    #[default]
    Table,
    /// Membership in a ban group.
    Group,
}

impl BanMethod {
    /// Matches a method name by prefix (`tab...`, `gro...`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.starts_with("tab") {
            Some(Self::Table)
        } else if s.starts_with("gro") {
            Some(Self::Group)
        } else {
            None
        }
    }
}

/// Which side wins during group synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncDirection {
    /// Changes flow both ways.
    #[default]
    TwoWay,
    /// The web application is authoritative.
    WebApplication,
    /// The game server is authoritative.
    Minecraft,
}

impl SyncDirection {
    /// Matches a direction by prefix (`two...`, `web...`, `min...`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.starts_with("two") {
            Some(Self::TwoWay)
        } else if s.starts_with("web") {
            Some(Self::WebApplication)
        } else if s.starts_with("min") {
            Some(Self::Minecraft)
        } else {
            None
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TwoWay => "two-way",
            Self::WebApplication => "web-application",
            Self::Minecraft => "minecraft",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("multiple-key-value", Some(SecondaryGroupStorage::MultipleKeyValue))]
    #[test_case("Multi", Some(SecondaryGroupStorage::MultipleKeyValue))]
    #[test_case("key-value", Some(SecondaryGroupStorage::KeyValue))]
    #[test_case("SINGLE", Some(SecondaryGroupStorage::SingleColumn))]
    #[test_case("junction", Some(SecondaryGroupStorage::JunctionTable))]
    #[test_case("table", Some(SecondaryGroupStorage::JunctionTable))]
    #[test_case("", None)]
    #[test_case("csv", None)]
    fn test_secondary_storage_prefix(input: &str, expected: Option<SecondaryGroupStorage>) {
        assert_eq!(SecondaryGroupStorage::parse(input), expected);
    }

    #[test_case("generic", Some(InsertMethod::Generic))]
    #[test_case("gen", Some(InsertMethod::Generic))]
    #[test_case("SMF2", Some(InsertMethod::Smf))]
    #[test_case("phpbb", None)]
    fn test_insert_method_prefix(input: &str, expected: Option<InsertMethod>) {
        assert_eq!(InsertMethod::parse(input), expected);
    }

    #[test]
    fn test_ban_and_direction_prefix() {
        assert_eq!(BanMethod::parse("tables"), Some(BanMethod::Table));
        assert_eq!(BanMethod::parse("groups"), Some(BanMethod::Group));
        assert_eq!(BanMethod::parse("file"), None);
        assert_eq!(SyncDirection::parse("web"), Some(SyncDirection::WebApplication));
        assert_eq!(SyncDirection::parse("Minecraft"), Some(SyncDirection::Minecraft));
        assert_eq!(SyncDirection::parse("two-way"), Some(SyncDirection::TwoWay));
    }

    #[test]
    fn test_storage_key_and_delimiter_usage() {
        assert!(SecondaryGroupStorage::MultipleKeyValue.uses_key());
        assert!(!SecondaryGroupStorage::MultipleKeyValue.uses_delimiter());
        assert!(SecondaryGroupStorage::KeyValue.uses_key());
        assert!(SecondaryGroupStorage::KeyValue.uses_delimiter());
        assert!(!SecondaryGroupStorage::JunctionTable.uses_key());
    }

    #[test]
    fn test_tracker_binding_encoding() {
        let direct = TrackerBinding::for_encoding(false, "last_online".into(), String::new());
        assert_eq!(direct.name(), "last_online");
        assert_eq!(direct.formatted_name(), None);

        let keyed = TrackerBinding::for_encoding(true, "cb_gametime".into(), "cb_gametime_f".into());
        assert!(matches!(keyed, TrackerBinding::KeyValue { .. }));
        assert_eq!(keyed.formatted_name(), Some("cb_gametime_f"));
    }
}
