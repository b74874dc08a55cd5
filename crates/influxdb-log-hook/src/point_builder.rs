// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Translation of log entries into points.

use crate::entry::LogEntry;
use crate::errors::InvalidPointError;
use crate::point::Point;
use crate::value::Value;
use std::collections::BTreeMap;

pub const MESSAGE_FIELD: &str = "message";
pub const LEVEL_TAG: &str = "level";

/// Builds one [`Point`] per log entry.
///
/// Entry fields named in `tag_fields` are promoted to tags and removed from
/// the field-set; every other entry field is kept as a field. The message
/// always lands in the `message` field and the severity in the `level` tag.
#[derive(Debug, Clone)]
pub struct PointBuilder {
    metric: String,
    tag_fields: Vec<String>,
}

impl PointBuilder {
    pub fn new(metric: impl Into<String>, tag_fields: Vec<String>) -> Self {
        Self {
            metric: metric.into(),
            tag_fields,
        }
    }

    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    #[must_use]
    pub fn tag_fields(&self) -> &[String] {
        &self.tag_fields
    }

    pub fn build(&self, entry: &LogEntry) -> Result<Point, InvalidPointError> {
        let mut tags = BTreeMap::new();
        for name in &self.tag_fields {
            if let Some(value) = entry.fields.get(name) {
                tags.insert(name.clone(), value.to_string());
            }
        }
        tags.insert(LEVEL_TAG.to_string(), entry.level.to_string());

        let mut fields: BTreeMap<String, Value> = entry
            .fields
            .iter()
            .filter(|(key, _)| !self.tag_fields.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        fields.insert(MESSAGE_FIELD.to_string(), Value::String(entry.message.clone()));

        // covers `level`, which is always a tag
        for key in tags.keys() {
            fields.remove(key);
        }

        Point::new(self.metric.as_str(), tags, fields, entry.time)
    }
}
