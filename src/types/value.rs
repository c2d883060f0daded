use crate::common::helper::quote_string_literal;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Column type as reported by the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValueType {
    Boolean,
    Int64,
    Float64,
    Numeric,
    BigNumeric,
    String,
    Bytes,
    Date,
    DateTime,
    Time,
    Timestamp,
    /// Any other warehouse type (GEOGRAPHY, JSON, RECORD, ...). Values of
    /// these columns are carried as their string form.
    Other(String),
}

impl ValueType {
    /// Map a BigQuery schema type name to a value type
    pub fn from_bigquery(type_name: &str) -> Self {
        match type_name.to_ascii_uppercase().as_str() {
            "BOOLEAN" | "BOOL" => ValueType::Boolean,
            "INTEGER" | "INT64" => ValueType::Int64,
            "FLOAT" | "FLOAT64" => ValueType::Float64,
            "NUMERIC" | "DECIMAL" => ValueType::Numeric,
            "BIGNUMERIC" | "BIGDECIMAL" => ValueType::BigNumeric,
            "STRING" => ValueType::String,
            "BYTES" => ValueType::Bytes,
            "DATE" => ValueType::Date,
            "DATETIME" => ValueType::DateTime,
            "TIME" => ValueType::Time,
            "TIMESTAMP" => ValueType::Timestamp,
            other => ValueType::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ValueType::Boolean => "bool",
            ValueType::Int64 => "int64",
            ValueType::Float64 => "float64",
            ValueType::Numeric => "numeric",
            ValueType::BigNumeric => "bignumeric",
            ValueType::String => "string",
            ValueType::Bytes => "bytes",
            ValueType::Date => "date",
            ValueType::DateTime => "datetime",
            ValueType::Time => "time",
            ValueType::Timestamp => "timestamp",
            ValueType::Other(name) => name,
        }
    }

    /// Whether values of this type can be written back as a literal that
    /// compares equal to the stored value
    pub fn has_literal_form(&self) -> bool {
        !matches!(self, ValueType::Other(_))
    }
}

/// A single scalar cell or category value.
///
/// Decimal and temporal values keep the warehouse's text form so they
/// round-trip into SQL literals without losing precision.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Numeric(String),
    BigNumeric(String),
    String(String),
    /// Base64 text, as the REST API returns it
    Bytes(String),
    Date(String),
    DateTime(String),
    Time(String),
    /// Microseconds since the Unix epoch
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Parse the string form the warehouse returns for a cell of the given type.
    ///
    /// Cells that fail to parse as their declared type are kept as strings.
    pub fn parse_typed(raw: &str, value_type: &ValueType) -> Self {
        match value_type {
            ValueType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => Value::String(raw.to_string()),
            },
            ValueType::Int64 => raw
                .parse::<i64>()
                .map(Value::Int64)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            ValueType::Float64 => raw
                .parse::<f64>()
                .map(Value::Float64)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            ValueType::Numeric => Value::Numeric(raw.to_string()),
            ValueType::BigNumeric => Value::BigNumeric(raw.to_string()),
            ValueType::Bytes => Value::Bytes(raw.to_string()),
            ValueType::Date => Value::Date(raw.to_string()),
            ValueType::DateTime => Value::DateTime(raw.to_string()),
            ValueType::Time => Value::Time(raw.to_string()),
            ValueType::Timestamp => parse_timestamp_micros(raw)
                .map(Value::Timestamp)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            ValueType::String | ValueType::Other(_) => Value::String(raw.to_string()),
        }
    }

    /// Render as a GoogleSQL literal. NULL has no literal form usable in an
    /// equality comparison, so it yields `None`.
    pub fn to_sql_literal(&self) -> Option<String> {
        let typed = |keyword: &str, raw: &str| format!("{} {}", keyword, quote_string_literal(raw));
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Int64(i) => Some(i.to_string()),
            Value::Float64(f) if f.is_finite() => Some(f.to_string()),
            Value::Float64(f) => Some(format!("CAST({} AS FLOAT64)", quote_string_literal(&f.to_string()))),
            Value::Numeric(raw) => Some(typed("NUMERIC", raw)),
            Value::BigNumeric(raw) => Some(typed("BIGNUMERIC", raw)),
            Value::String(s) => Some(quote_string_literal(s)),
            Value::Bytes(b64) => Some(format!("FROM_BASE64({})", quote_string_literal(b64))),
            Value::Date(raw) => Some(typed("DATE", raw)),
            Value::DateTime(raw) => Some(typed("DATETIME", raw)),
            Value::Time(raw) => Some(typed("TIME", raw)),
            Value::Timestamp(micros) => Some(format!("TIMESTAMP_MICROS({})", micros)),
        }
    }
}

/// Timestamps arrive as integer microseconds when requested with
/// `useInt64Timestamp`, otherwise as floating-point epoch seconds.
fn parse_timestamp_micros(raw: &str) -> Option<i64> {
    if let Ok(micros) = raw.parse::<i64>() {
        return Some(micros);
    }
    let seconds = raw.parse::<f64>().ok().filter(|s| s.is_finite())?;
    Some((seconds * 1_000_000.0).round() as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Numeric(s)
            | Value::BigNumeric(s)
            | Value::String(s)
            | Value::Bytes(s)
            | Value::Date(s)
            | Value::DateTime(s)
            | Value::Time(s) => write!(f, "{}", s),
            Value::Timestamp(micros) => match DateTime::<Utc>::from_timestamp_micros(*micros) {
                Some(ts) if micros.rem_euclid(1_000_000) == 0 => {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S UTC"))
                }
                Some(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.6f UTC")),
                None => write!(f, "{}", micros),
            },
        }
    }
}

// Numbers and booleans stay JSON scalars; everything else is written in
// its display form so decimals keep full precision.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Int64(i) => serializer.serialize_i64(*i),
            Value::Float64(v) => serializer.serialize_f64(*v),
            other => serializer.collect_str(other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
