// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Scalar values carried by log fields and point fields.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// A log field value.
///
/// The set of variants is closed so that both the tag rendering (via
/// [`fmt::Display`]) and the line protocol encoding stay deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    UInteger(u64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Whether the value can be written to InfluxDB at all.
    ///
    /// Line protocol has no representation for NaN or infinities.
    #[must_use]
    pub fn is_representable(&self) -> bool {
        match self {
            Value::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    /// Encodes the value as a line protocol field value.
    pub(crate) fn write_field(&self, out: &mut String) {
        match self {
            Value::Integer(v) => {
                out.push_str(&v.to_string());
                out.push('i');
            }
            Value::UInteger(v) => {
                out.push_str(&v.to_string());
                out.push('u');
            }
            Value::Float(v) => out.push_str(&v.to_string()),
            Value::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
            Value::String(_) | Value::Timestamp(_) => {
                out.push('"');
                for ch in self.to_string().chars() {
                    if ch == '"' || ch == '\\' {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push('"');
            }
        }
    }
}

/// String rendering used when a field is promoted to a tag.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => f.write_str(v),
            Value::Integer(v) => write!(f, "{v}"),
            Value::UInteger(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Timestamp(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInteger(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInteger(u64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}
