// src/value.rs

//! The tagged value variant callers pass into `insert`/`upsert`/`add_columns`.
//!
//! Every value callers hand the core already carries its kind, so coercion
//! only ever needs to check the declared column type against this tag
//! instead of guessing from a duck-typed scalar.

use chrono::NaiveDateTime;

use crate::metadata::model::DataType;

/// A single cell value, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    /// Millisecond-precision timestamp, already normalized to
    /// `YYYY-MM-DD HH:MM:SS.fff` by the caller or by `Value::timestamp`.
    Timestamp(String),
}

impl Value {
    /// Build a `Timestamp` value from a `chrono` datetime, formatting it to
    /// the crate's exact millisecond precision (.6).
    pub fn timestamp(dt: NaiveDateTime) -> Self {
        Value::Timestamp(format_timestamp(dt))
    }

    /// The logical type this value would be stored as absent any column
    /// type declaration — used by type inference.
    pub fn inferred_type(&self) -> DataType {
        match self {
            Value::Text(_) => DataType::Text,
            Value::Integer(_) => DataType::Integer,
            Value::Real(_) => DataType::Real,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }
}

/// Format a datetime to the crate's storage form: exactly three
/// fractional-second digits, no timezone suffix.
pub fn format_timestamp(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}
