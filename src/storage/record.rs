//! Flat key-path records stored as nested YAML documents.

use crate::{Error, Result};
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;

/// A single cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A string.
    Text(String),
    /// A number. Written with enough precision to read back bit-exact.
    Number(f64),
    /// An ordered list of strings.
    List(Vec<String>),
}

/// A flat map from dot-separated key paths to values.
///
/// `webapp.group-ids` is stored on disk as a `group-ids` entry inside a
/// `webapp` mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheRecord {
    values: BTreeMap<String, RecordValue>,
}

impl CacheRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the record holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns the value at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.values.get(key)
    }

    /// Sets a string value.
    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), RecordValue::Text(value.into()));
    }

    /// Sets a numeric value.
    pub fn set_number(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), RecordValue::Number(value));
    }

    /// Sets a list value.
    pub fn set_list(&mut self, key: impl Into<String>, value: Vec<String>) {
        self.values.insert(key.into(), RecordValue::List(value));
    }

    /// Reads a string. Numbers are rendered as text.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            RecordValue::Text(s) => Some(s.clone()),
            RecordValue::Number(n) => Some(n.to_string()),
            RecordValue::List(_) => None,
        }
    }

    /// Reads a number. Numeric text is parsed.
    #[must_use]
    pub fn get_number(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            RecordValue::Number(n) => Some(*n),
            RecordValue::Text(s) => s.trim().parse().ok(),
            RecordValue::List(_) => None,
        }
    }

    /// Reads a list.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.values.get(key)? {
            RecordValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Iterates values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parses a YAML document. An empty document gives an empty record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the text is not YAML or its top level is
    /// not a mapping.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let root: Value = serde_yaml_ng::from_str(text).map_err(|e| Error::Parse {
            key: String::new(),
            cause: e.to_string(),
        })?;
        let mut record = Self::new();
        match root {
            Value::Null => {},
            Value::Mapping(map) => flatten(&map, "", &mut record.values),
            _ => {
                return Err(Error::Parse {
                    key: String::new(),
                    cause: "cache record must be a mapping".to_string(),
                });
            },
        }
        Ok(record)
    }

    /// Renders the record as a nested YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        let mut root = Mapping::new();
        for (key, value) in &self.values {
            insert_path(&mut root, key, to_value(value));
        }
        serde_yaml_ng::to_string(&Value::Mapping(root)).map_err(|e| Error::OperationFailed {
            operation: "serialize_cache_record".to_string(),
            cause: e.to_string(),
        })
    }
}

fn to_value(value: &RecordValue) -> Value {
    match value {
        RecordValue::Text(s) => Value::String(s.clone()),
        RecordValue::Number(n) => Value::Number((*n).into()),
        RecordValue::List(items) => {
            Value::Sequence(items.iter().cloned().map(Value::String).collect())
        },
    }
}

fn insert_path(root: &mut Mapping, key: &str, value: Value) {
    let (parents, leaf) = key.rsplit_once('.').map_or((None, key), |(p, l)| (Some(p), l));
    let mut node = root;
    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        let entry = node
            .entry(Value::String(segment.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !entry.is_mapping() {
            *entry = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(child) = entry else {
            return;
        };
        node = child;
    }
    node.insert(Value::String(leaf.to_string()), value);
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flatten(map: &Mapping, prefix: &str, out: &mut BTreeMap<String, RecordValue>) {
    for (key, value) in map {
        let Some(segment) = scalar_text(key) else {
            continue;
        };
        let path = if prefix.is_empty() {
            segment
        } else {
            format!("{prefix}.{segment}")
        };
        match value {
            Value::Mapping(child) => flatten(child, &path, out),
            Value::Sequence(items) => {
                out.insert(
                    path,
                    RecordValue::List(items.iter().filter_map(scalar_text).collect()),
                );
            },
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    out.insert(path, RecordValue::Number(f));
                }
            },
            other => {
                if let Some(text) = scalar_text(other) {
                    out.insert(path, RecordValue::Text(text));
                }
            },
        }
    }
}
