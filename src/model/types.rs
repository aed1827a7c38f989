//! Attribute type definitions
//!
//! Supported attribute types:
//! - bool: Boolean
//! - int: 64-bit signed integer
//! - float: 64-bit floating point
//! - string: UTF-8 string
//! - enum: enumerated string (symbol-like)
//! - time: UTC timestamp, microsecond precision
//!
//! Index classification is derived from the type: bool, string and
//! enum attributes use exact (set-valued) indexes; int, float and time
//! attributes use range (score-ordered) indexes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ModelError;

/// Supported attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// UTF-8 string
    String,
    /// Enumerated string (symbol-like)
    Enum,
    /// UTC timestamp with microsecond precision
    Time,
}

impl AttrType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrType::Bool => "bool",
            AttrType::Int => "int",
            AttrType::Float => "float",
            AttrType::String => "string",
            AttrType::Enum => "enum",
            AttrType::Time => "time",
        }
    }

    /// Returns the index class this type belongs to when indexed
    pub fn index_kind(&self) -> IndexKind {
        match self {
            AttrType::Bool | AttrType::String | AttrType::Enum => IndexKind::Exact,
            AttrType::Int | AttrType::Float | AttrType::Time => IndexKind::Range,
        }
    }
}

/// Index classification for an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Not indexed; may not appear in predicates
    None,
    /// Set-valued index keyed by literal value (equality predicates)
    Exact,
    /// Score-ordered index (equality and range predicates)
    Range,
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Enumerated string value
    Enum(String),
    /// Timestamp value
    Time(DateTime<Utc>),
}

impl AttrValue {
    /// Returns the type this value belongs to
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Int(_) => AttrType::Int,
            AttrValue::Float(_) => AttrType::Float,
            AttrValue::String(_) => AttrType::String,
            AttrValue::Enum(_) => AttrType::Enum,
            AttrValue::Time(_) => AttrType::Time,
        }
    }

    /// Encodes the value as a hash field string.
    ///
    /// The same encoding is used for the value segment of exact index
    /// keys, so it must be stable across releases.
    pub fn encode(&self) -> String {
        match self {
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Int(i) => i.to_string(),
            AttrValue::Float(f) => f.to_string(),
            AttrValue::String(s) | AttrValue::Enum(s) => s.clone(),
            AttrValue::Time(t) => encode_time(t),
        }
    }

    /// Returns the numeric score used in range indexes, or None for
    /// exact-class types.
    pub fn score(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            AttrValue::Time(t) => Some(t.timestamp_micros() as f64 / 1_000_000.0),
            _ => None,
        }
    }

    /// Decodes a hash field string back into a typed value
    pub fn decode(attr_type: AttrType, raw: &str) -> Result<Self, ModelError> {
        let decode_err = || ModelError::Decode {
            expected: attr_type.type_name(),
            value: raw.to_string(),
        };

        match attr_type {
            AttrType::Bool => match raw {
                "true" => Ok(AttrValue::Bool(true)),
                "false" => Ok(AttrValue::Bool(false)),
                _ => Err(decode_err()),
            },
            AttrType::Int => raw.parse().map(AttrValue::Int).map_err(|_| decode_err()),
            AttrType::Float => raw.parse().map(AttrValue::Float).map_err(|_| decode_err()),
            AttrType::String => Ok(AttrValue::String(raw.to_string())),
            AttrType::Enum => Ok(AttrValue::Enum(raw.to_string())),
            AttrType::Time => decode_time(raw).ok_or_else(decode_err).map(AttrValue::Time),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttrValue::Time(v)
    }
}

/// Encodes a timestamp as fractional epoch seconds with a fixed
/// six-digit microsecond part.
fn encode_time(t: &DateTime<Utc>) -> String {
    let micros = t.timestamp_micros();
    let secs = micros.div_euclid(1_000_000);
    let frac = micros.rem_euclid(1_000_000);
    format!("{}.{:06}", secs, frac)
}

/// Decodes the `<secs>.<micros>` encoding produced by `encode_time`
fn decode_time(raw: &str) -> Option<DateTime<Utc>> {
    let (secs_part, frac_part) = raw.split_once('.')?;
    let secs: i64 = secs_part.parse().ok()?;
    if frac_part.len() != 6 {
        return None;
    }
    let micros: u32 = frac_part.parse().ok()?;
    DateTime::from_timestamp(secs, micros * 1_000)
}
