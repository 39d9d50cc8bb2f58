//! # Run Metadata
//!
//! Typed key/value metadata attached to process runs.
//!
//! Runs carry a flat map whose values are restricted to scalars. Nested JSON is
//! rejected when metadata enters the core, so neutralization can pattern-match
//! on the value variant and always produce a placeholder of the same shape.

use crate::constants::retention::REDACTION_MARKER;
use crate::error::{Result, RunLedgerError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetaValue {
    /// Type-preserving placeholder used when the value is not safe to keep
    pub fn redacted(&self) -> MetaValue {
        match self {
            Self::Null => Self::Null,
            Self::Bool(_) => Self::Bool(false),
            Self::Integer(_) => Self::Integer(0),
            Self::Float(_) => Self::Float(0.0),
            Self::String(_) => Self::String(REDACTION_MARKER.to_string()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<MetaValue> for Value {
    fn from(value: MetaValue) -> Self {
        match value {
            MetaValue::Null => Value::Null,
            MetaValue::Bool(b) => Value::Bool(b),
            MetaValue::Integer(i) => Value::from(i),
            MetaValue::Float(f) => Value::from(f),
            MetaValue::String(s) => Value::String(s),
        }
    }
}

/// Run metadata, ordered by key
pub type Metadata = BTreeMap<String, MetaValue>;

/// Convert a scalar JSON value, rejecting arrays and objects
pub fn meta_value_from_json(key: &str, value: &Value) -> Result<MetaValue> {
    match value {
        Value::Null => Ok(MetaValue::Null),
        Value::Bool(b) => Ok(MetaValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(MetaValue::Integer(i)),
            None => n.as_f64().map(MetaValue::Float).ok_or_else(|| {
                RunLedgerError::validation(format!("metadata field '{key}' is out of range"))
            }),
        },
        Value::String(s) => Ok(MetaValue::String(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(RunLedgerError::validation(format!(
            "metadata field '{key}' must be a string, number, boolean or null"
        ))),
    }
}

/// Parse a JSON object into run metadata
pub fn metadata_from_json(value: &Value) -> Result<Metadata> {
    match value {
        Value::Null => Ok(Metadata::new()),
        Value::Object(map) => map
            .iter()
            .map(|(key, v)| meta_value_from_json(key, v).map(|mv| (key.clone(), mv)))
            .collect(),
        _ => Err(RunLedgerError::validation(
            "run metadata must be a JSON object",
        )),
    }
}

pub fn metadata_to_json(metadata: &Metadata) -> Value {
    Value::Object(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect(),
    )
}

/// Declared run metadata fields of a process: field name to declared type
///
/// Read from `run_metadata_schema` in the process metadata. The core only
/// exposes it; filtering and sorting on these fields live in the query layer.
pub type RunMetadataSchema = BTreeMap<String, String>;
