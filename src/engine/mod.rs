//! The engine port: everything the pager knows about the thing that runs queries.
//!
//! An engine answers two questions, `describe` (what columns would this query
//! produce) and `run` (give me its rows). Values leave the engine already
//! coerced into something the JSON transport can carry.

pub mod memory;

pub use memory::{MemoryEngine, ResultSet};

use crate::data::datatable::{DataValue, MAX_SAFE_INTEGER};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// One result row, keyed by column name in schema order
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// Ordered column list reported by `describe`; serializes as a bare array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub columns: Vec<ColumnDescription>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDescription>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescription> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Errors an engine reports. The Display text is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("syntax error near {0}")]
    Syntax(String),

    #[error("table with name {0} does not exist")]
    MissingRelation(String),

    #[error("column {0} not found")]
    MissingColumn(String),

    #[error("{0}")]
    Execution(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    Syntax,
    MissingRelation,
    MissingColumn,
    Execution,
}

impl EngineError {
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            EngineError::Syntax(_) => EngineErrorKind::Syntax,
            EngineError::MissingRelation(_) => EngineErrorKind::MissingRelation,
            EngineError::MissingColumn(_) => EngineErrorKind::MissingColumn,
            EngineError::Execution(_) => EngineErrorKind::Execution,
        }
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// Column names and type tags the query would produce
    async fn describe(&self, query: &str) -> Result<Schema, EngineError>;

    /// Execute the query and return all of its rows
    async fn run(&self, query: &str) -> Result<Vec<Row>, EngineError>;
}

/// Convert a cell into a JSON value that survives the transport.
///
/// Integers beyond +/-(2^53 - 1) become doubles and lose precision. Binary
/// data becomes a `\x` prefixed hex string.
pub fn to_transport_value(value: &DataValue) -> Value {
    match value {
        DataValue::Null => Value::Null,
        DataValue::Boolean(b) => Value::Bool(*b),
        DataValue::Integer(i) if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 => {
            float_value(*i as f64)
        }
        DataValue::Integer(i) => Value::Number((*i).into()),
        DataValue::Float(f) => float_value(*f),
        DataValue::String(s) | DataValue::Date(s) | DataValue::DateTime(s) => {
            Value::String(s.clone())
        }
        DataValue::Binary(_) => Value::String(value.to_string()),
    }
}

// NaN and infinities have no JSON spelling
fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_integers_stay_integral() {
        assert_eq!(
            to_transport_value(&DataValue::Integer(MAX_SAFE_INTEGER)),
            serde_json::json!(9007199254740991i64)
        );
        assert!(to_transport_value(&DataValue::Integer(-42)).is_i64());
    }

    #[test]
    fn test_wide_integers_become_floats() {
        let value = to_transport_value(&DataValue::Integer(MAX_SAFE_INTEGER + 2));
        assert!(value.is_f64());
        assert_eq!(value.as_f64(), Some(9007199254740993i64 as f64));

        let negative = to_transport_value(&DataValue::Integer(i64::MIN));
        assert!(negative.is_f64());
    }

    #[test]
    fn test_binary_and_non_finite_values() {
        assert_eq!(
            to_transport_value(&DataValue::Binary(vec![0xde, 0xad])),
            Value::String("\\xdead".to_string())
        );
        assert_eq!(to_transport_value(&DataValue::Float(f64::NAN)), Value::Null);
    }

    #[test]
    fn test_schema_serializes_as_array() {
        let schema = Schema::new(vec![ColumnDescription::new("id", "BIGINT")]);
        assert_eq!(
            serde_json::to_string(&schema).unwrap(),
            r#"[{"name":"id","type":"BIGINT"}]"#
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EngineError::Syntax("\"FROM\"".to_string()).to_string(),
            "syntax error near \"FROM\""
        );
        assert_eq!(
            EngineError::MissingRelation("trades".to_string()).to_string(),
            "table with name trades does not exist"
        );
        assert_eq!(
            EngineError::MissingColumn("px".to_string()).kind(),
            EngineErrorKind::MissingColumn
        );
    }
}
