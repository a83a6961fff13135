//! Database value enumeration used for parameter binding and row values
//!
//! Every value crossing the capability boundary — bound parameters going out,
//! row cells coming back — is a [`DbValue`]. Type-directed coercion between
//! caller-supplied JSON and `DbValue` lives in the mapper module.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A single database value.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Json(JsonValue),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DbValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DbValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DbValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to a JSON value, for serialization and for nested
    /// relationship payloads handed back to callers.
    pub fn to_json(&self) -> JsonValue {
        match self {
            DbValue::Null => JsonValue::Null,
            DbValue::Bool(v) => JsonValue::Bool(*v),
            DbValue::Int(v) => JsonValue::from(*v),
            DbValue::Float(v) => {
                serde_json::Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number)
            }
            DbValue::Text(v) => JsonValue::String(v.clone()),
            DbValue::Uuid(v) => JsonValue::String(v.to_string()),
            DbValue::Date(v) => JsonValue::String(v.to_string()),
            DbValue::DateTime(v) => JsonValue::String(v.to_rfc3339()),
            DbValue::Json(v) => v.clone(),
        }
    }
}

impl std::fmt::Display for DbValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbValue::Null => write!(f, "NULL"),
            DbValue::Bool(v) => write!(f, "{}", v),
            DbValue::Int(v) => write!(f, "{}", v),
            DbValue::Float(v) => write!(f, "{}", v),
            DbValue::Text(v) => write!(f, "{}", v),
            DbValue::Uuid(v) => write!(f, "{}", v),
            DbValue::Date(v) => write!(f, "{}", v),
            DbValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            DbValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Int(v)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        DbValue::Int(i64::from(v))
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Float(v)
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Bool(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<Uuid> for DbValue {
    fn from(v: Uuid) -> Self {
        DbValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for DbValue {
    fn from(v: DateTime<Utc>) -> Self {
        DbValue::DateTime(v)
    }
}

impl From<NaiveDate> for DbValue {
    fn from(v: NaiveDate) -> Self {
        DbValue::Date(v)
    }
}
