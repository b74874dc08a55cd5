// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Time-series points and their line protocol encoding.
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp
//! ```

use crate::errors::InvalidPointError;
use crate::value::Value;
use crate::writer::Precision;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One time-stamped observation.
///
/// Points are validated on construction and immutable afterwards. Tags and
/// fields are kept in sorted maps so the encoded form is canonical.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, Value>,
    timestamp: DateTime<Utc>,
    nanos: i64,
}

impl Point {
    /// Validates and builds a point.
    ///
    /// Tags with an empty value are omitted since line protocol cannot carry
    /// them. A key may not appear both as a tag and as a field.
    pub fn new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, InvalidPointError> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(InvalidPointError::EmptyMeasurement);
        }
        if tags.keys().any(String::is_empty) {
            return Err(InvalidPointError::EmptyTagKey);
        }
        if fields.is_empty() {
            return Err(InvalidPointError::NoFields);
        }
        for (key, value) in &fields {
            if key.is_empty() {
                return Err(InvalidPointError::EmptyFieldKey);
            }
            if tags.contains_key(key) {
                return Err(InvalidPointError::DuplicateKey(key.clone()));
            }
            if !value.is_representable() {
                return Err(InvalidPointError::Unrepresentable(key.clone()));
            }
        }
        let nanos = timestamp
            .timestamp_nanos_opt()
            .ok_or(InvalidPointError::TimestampOutOfRange)?;

        let tags = tags.into_iter().filter(|(_, v)| !v.is_empty()).collect();

        Ok(Self {
            measurement,
            tags,
            fields,
            timestamp,
            nanos,
        })
    }

    #[must_use]
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Encodes the point as a single line, without the trailing newline.
    #[must_use]
    pub fn to_line_protocol(&self, precision: Precision) -> String {
        let mut line = String::new();
        self.write_line(precision, &mut line);
        line
    }

    pub(crate) fn write_line(&self, precision: Precision, out: &mut String) {
        escape_into(out, &self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            out.push(',');
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            escape_into(out, value, &[',', '=', ' ']);
        }

        out.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            value.write_field(out);
        }

        out.push(' ');
        out.push_str(&precision.scale(self.nanos).to_string());
    }
}

// Newlines terminate a line, so they are always escaped outside of string fields.
// A run of backslashes right before an escape or the end of the text is
// doubled so it cannot swallow the character that follows.
fn escape_into(out: &mut String, s: &str, special: &[char]) {
    let mut backslashes = 0;
    for ch in s.chars() {
        if ch == '\\' {
            backslashes += 1;
            out.push(ch);
            continue;
        }
        match ch {
            '\n' => {
                push_backslashes(out, backslashes);
                out.push_str("\\n");
            }
            c if special.contains(&c) => {
                push_backslashes(out, backslashes + 1);
                out.push(c);
            }
            c => out.push(c),
        }
        backslashes = 0;
    }
    push_backslashes(out, backslashes);
}

fn push_backslashes(out: &mut String, n: usize) {
    for _ in 0..n {
        out.push('\\');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_opt(1, 0).unwrap()
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_simple_point() {
        let point = Point::new(
            "temperature",
            BTreeMap::new(),
            fields(&[("value", Value::Float(23.5))]),
            ts(),
        )
        .unwrap();
        assert_eq!(
            point.to_line_protocol(Precision::Nanoseconds),
            "temperature value=23.5 1000000000"
        );
        assert_eq!(point.to_line_protocol(Precision::Seconds), "temperature value=23.5 1");
    }

    #[test]
    fn test_tags_and_fields_are_sorted() {
        let point = Point::new(
            "logs",
            tags(&[("user", "bob"), ("level", "error")]),
            fields(&[
                ("message", Value::from("boom")),
                ("attempt", Value::Integer(3)),
            ]),
            ts(),
        )
        .unwrap();
        assert_eq!(
            point.to_line_protocol(Precision::Nanoseconds),
            r#"logs,level=error,user=bob attempt=3i,message="boom" 1000000000"#
        );
    }

    #[test]
    fn test_escape_special_chars() {
        let point = Point::new(
            "my measurement",
            tags(&[("tag key", "tag,value")]),
            fields(&[("field=key", Value::from("hello \"world\""))]),
            ts(),
        )
        .unwrap();
        assert_eq!(
            point.to_line_protocol(Precision::Nanoseconds),
            "my\\ measurement,tag\\ key=tag\\,value field\\=key=\"hello \\\"world\\\"\" 1000000000"
        );
    }

    #[test]
    fn test_backslashes_before_separators_are_doubled() {
        let point = Point::new(
            "dir\\",
            tags(&[("path", "C:\\temp\\"), ("k", "a\\,b")]),
            fields(&[("message", Value::from("x"))]),
            ts(),
        )
        .unwrap();
        assert_eq!(
            point.to_line_protocol(Precision::Nanoseconds),
            r#"dir\\,k=a\\\,b,path=C:\temp\\ message="x" 1000000000"#
        );
    }

    #[test]
    fn test_empty_tag_values_are_omitted() {
        let point = Point::new(
            "logs",
            tags(&[("user", "")]),
            fields(&[("message", Value::from("x"))]),
            ts(),
        )
        .unwrap();
        assert!(point.tags().is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let f = fields(&[("message", Value::from("x"))]);
        assert_eq!(
            Point::new("", BTreeMap::new(), f.clone(), ts()),
            Err(InvalidPointError::EmptyMeasurement)
        );
        assert_eq!(
            Point::new("m", tags(&[("", "v")]), f.clone(), ts()),
            Err(InvalidPointError::EmptyTagKey)
        );
        assert_eq!(
            Point::new("m", BTreeMap::new(), BTreeMap::new(), ts()),
            Err(InvalidPointError::NoFields)
        );
        assert_eq!(
            Point::new("m", BTreeMap::new(), fields(&[("", Value::Boolean(true))]), ts()),
            Err(InvalidPointError::EmptyFieldKey)
        );
        assert_eq!(
            Point::new("m", tags(&[("message", "v")]), f, ts()),
            Err(InvalidPointError::DuplicateKey("message".to_string()))
        );
        assert_eq!(
            Point::new("m", BTreeMap::new(), fields(&[("v", Value::Float(f64::NAN))]), ts()),
            Err(InvalidPointError::Unrepresentable("v".to_string()))
        );
    }

    proptest! {
        #[test]
        fn prop_encoded_line_has_three_sections(
            measurement in "[a-z ,=]{1,12}",
            tag_value in "[a-z ,=\n]{1,12}",
            message in ".{0,32}",
        ) {
            let point = Point::new(
                measurement,
                tags(&[("host", tag_value.as_str())]),
                fields(&[("message", Value::from(message.as_str()))]),
                ts(),
            ).unwrap();
            let line = point.to_line_protocol(Precision::Nanoseconds);
            prop_assert!(!line.contains('\n'));
            prop_assert!(line.ends_with(" 1000000000"));
        }
    }
}
