//! Key-path addressable configuration documents.
//!
//! A [`ConfigDocument`] wraps a parsed YAML (or TOML) tree and exposes typed
//! accessors addressed by dot-separated key paths such as
//! `app-group-config.primary.table-name`. Every accessor takes an explicit
//! default that is returned when the key is absent or null, so a sparse
//! document never fails to load. A key that is present with the wrong type
//! is a [`Error::Parse`].

use crate::{Error, Result};
use serde_yaml_ng::Value;
use std::path::Path;

/// Maximum accepted size of a configuration file (1MB).
const MAX_DOCUMENT_SIZE: u64 = 1024 * 1024;

/// A hierarchical configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Value,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConfigDocument {
    /// Creates a document with no keys; every accessor yields its default.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Value::Mapping(serde_yaml_ng::Mapping::new()),
        }
    }

    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the text is not valid YAML or its root is
    /// not a mapping.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let root: Value = serde_yaml_ng::from_str(text).map_err(|e| Error::Parse {
            key: "<document>".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_value(root)
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the text is not valid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|e| Error::Parse {
            key: "<document>".to_string(),
            cause: e.to_string(),
        })?;
        let root = serde_yaml_ng::to_value(&table).map_err(|e| Error::Parse {
            key: "<document>".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_value(root)
    }

    /// Reads and parses a document, choosing TOML for `.toml` files and YAML
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`]
    /// if it cannot be parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::Io {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        if metadata.len() > MAX_DOCUMENT_SIZE {
            return Err(Error::Io {
                operation: "read_config_file".to_string(),
                cause: format!(
                    "{} exceeds maximum size of {MAX_DOCUMENT_SIZE} bytes",
                    path.display()
                ),
            });
        }

        let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    fn from_value(root: Value) -> Result<Self> {
        match root {
            Value::Mapping(_) => Ok(Self { root }),
            // An empty YAML file parses as null.
            Value::Null => Ok(Self::empty()),
            other => Err(Error::Parse {
                key: "<document>".to_string(),
                cause: format!("expected a mapping at the root, found {}", kind(&other)),
            }),
        }
    }

    /// Returns `true` if the key path resolves to a non-null value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Reads a string. Numbers and booleans are accepted and rendered as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is a sequence or mapping.
    pub fn get_string(&self, key: &str, default: &str) -> Result<String> {
        match self.lookup(key) {
            None => Ok(default.to_string()),
            Some(value) => scalar_to_string(value).ok_or_else(|| mismatch(key, "a string", value)),
        }
    }

    /// Reads a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is not a boolean.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.lookup(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(value) => Err(mismatch(key, "a boolean", value)),
        }
    }

    /// Reads a 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is not an integer or is out of
    /// range.
    pub fn get_int(&self, key: &str, default: i32) -> Result<i32> {
        let value = self.get_long(key, i64::from(default))?;
        i32::try_from(value).map_err(|_| Error::Parse {
            key: key.to_string(),
            cause: format!("{value} is out of range for a 32-bit integer"),
        })
    }

    /// Reads a 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is not an integer.
    pub fn get_long(&self, key: &str, default: i64) -> Result<i64> {
        match self.lookup(key) {
            None => Ok(default),
            Some(value @ Value::Number(n)) => n.as_i64().ok_or_else(|| mismatch(key, "an integer", value)),
            Some(value) => Err(mismatch(key, "an integer", value)),
        }
    }

    /// Reads a floating point number. Integers are widened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is not a number.
    pub fn get_double(&self, key: &str, default: f64) -> Result<f64> {
        match self.lookup(key) {
            None => Ok(default),
            Some(value @ Value::Number(n)) => n.as_f64().ok_or_else(|| mismatch(key, "a number", value)),
            Some(value) => Err(mismatch(key, "a number", value)),
        }
    }

    /// Returns the sub-document at `key`, or `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is not a section.
    pub fn section(&self, key: &str) -> Result<Option<Self>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(root @ Value::Mapping(_)) => Ok(Some(Self { root: root.clone() })),
            Some(value) => Err(mismatch(key, "a section", value)),
        }
    }

    /// Top-level keys of this document, in document order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        match &self.root {
            Value::Mapping(map) => map.keys().filter_map(scalar_to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Reads a list of strings. Missing keys yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is not a sequence of scalars.
    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.lookup(key) {
            None => Ok(Vec::new()),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| scalar_to_string(item).ok_or_else(|| mismatch(key, "a list of strings", item)))
                .collect(),
            Some(value) => Err(mismatch(key, "a list of strings", value)),
        }
    }

    /// Reads a section of scalar values as ordered `(key, value)` pairs.
    ///
    /// Keys are rendered as text, so numeric keys (group IDs) are accepted.
    /// Missing sections yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the value is not a mapping of scalars.
    pub fn get_string_map(&self, key: &str) -> Result<Vec<(String, String)>> {
        match self.lookup(key) {
            None => Ok(Vec::new()),
            Some(Value::Mapping(map)) => map
                .iter()
                .map(|(k, v)| {
                    let name = scalar_to_string(k).ok_or_else(|| mismatch(key, "scalar keys", k))?;
                    let value = scalar_to_string(v)
                        .ok_or_else(|| mismatch(&format!("{key}.{name}"), "a string", v))?;
                    Ok((name, value))
                })
                .collect(),
            Some(value) => Err(mismatch(key, "a section", value)),
        }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in key.split('.') {
            current = match current {
                Value::Mapping(map) => map.get(segment)?,
                _ => return None,
            };
        }
        match current {
            Value::Null => None,
            value => Some(value),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a section",
        Value::Tagged(_) => "a tagged value",
    }
}

fn mismatch(key: &str, expected: &str, found: &Value) -> Error {
    Error::Parse {
        key: key.to_string(),
        cause: format!("expected {expected}, found {}", kind(found)),
    }
}
