//! Store-agnostic document representation.

use std::collections::BTreeMap;

use apolo_core::DocumentId;
use chrono::{DateTime, Utc};

/// Field name to value map of a document.
pub type Fields = BTreeMap<String, FieldValue>;

/// A typed document field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(Fields),
    /// Write-only sentinel: the store sets the field to its request time.
    ServerTimestamp,
}

impl FieldValue {
    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the timestamp payload, if this is a timestamp.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Reads a list of strings, accepting a single string as a one-element list.
    ///
    /// Non-string array elements are skipped.
    #[must_use]
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            Self::String(s) => Some(vec![s.clone()]),
            Self::Array(values) => Some(
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        Self::Array(values.into_iter().map(Self::String).collect())
    }
}

/// A stored document: its ID plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}
