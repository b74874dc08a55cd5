// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch-write seam between the dispatcher and the backing store.

use crate::errors::WriteError;
use crate::point::Point;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Timestamp precision of a batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    #[default]
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "u")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl Precision {
    /// Query-string form expected by the `/write` endpoint.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Precision::Nanoseconds => "ns",
            Precision::Microseconds => "u",
            Precision::Milliseconds => "ms",
            Precision::Seconds => "s",
            Precision::Minutes => "m",
            Precision::Hours => "h",
        }
    }

    /// Converts a nanosecond timestamp to this precision, rounding towards
    /// negative infinity.
    #[must_use]
    pub const fn scale(&self, nanos: i64) -> i64 {
        let divisor: i64 = match self {
            Precision::Nanoseconds => 1,
            Precision::Microseconds => 1_000,
            Precision::Milliseconds => 1_000_000,
            Precision::Seconds => 1_000_000_000,
            Precision::Minutes => 60 * 1_000_000_000,
            Precision::Hours => 3_600 * 1_000_000_000,
        };
        nanos.div_euclid(divisor)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "n" | "ns" => Ok(Precision::Nanoseconds),
            "u" | "us" => Ok(Precision::Microseconds),
            "ms" => Ok(Precision::Milliseconds),
            "s" => Ok(Precision::Seconds),
            "m" => Ok(Precision::Minutes),
            "h" => Ok(Precision::Hours),
            other => Err(format!("unknown precision '{other}'")),
        }
    }
}

/// Metadata attached to every batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPointsConfig {
    /// Target database (or v2 bucket mapped through the v1 compatibility API).
    pub database: String,
    /// Retention policy, server default when `None`.
    #[serde(default)]
    pub retention_policy: Option<String>,
    #[serde(default)]
    pub precision: Precision,
    /// Write consistency (`any`, `one`, `quorum`, `all`), server default when `None`.
    #[serde(default)]
    pub write_consistency: Option<String>,
}

/// One batch-write request: the batch metadata plus the points, in submission order.
#[derive(Debug, Clone)]
pub struct BatchPoints {
    pub config: Arc<BatchPointsConfig>,
    pub points: Vec<Point>,
}

impl BatchPoints {
    #[must_use]
    pub fn new(config: Arc<BatchPointsConfig>, points: Vec<Point>) -> Self {
        Self { config, points }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Encodes every point as one newline-separated line protocol body.
    #[must_use]
    pub fn to_line_protocol(&self) -> String {
        let mut body = String::new();
        for point in &self.points {
            point.write_line(self.config.precision, &mut body);
            body.push('\n');
        }
        body
    }
}

/// Writes batches of points to a backing store.
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write(&self, batch: &BatchPoints) -> Result<(), WriteError>;
}

#[async_trait]
impl<W: PointWriter + ?Sized> PointWriter for Arc<W> {
    async fn write(&self, batch: &BatchPoints) -> Result<(), WriteError> {
        (**self).write(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_scale() {
        let nanos = 1_700_000_123_456_789;
        assert_eq!(Precision::Nanoseconds.scale(nanos), nanos);
        assert_eq!(Precision::Microseconds.scale(nanos), 1_700_000_123_456);
        assert_eq!(Precision::Milliseconds.scale(nanos), 1_700_000_123);
        assert_eq!(Precision::Seconds.scale(nanos), 1_700_000);
        assert_eq!(Precision::Minutes.scale(nanos), 28_333);
        assert_eq!(Precision::Hours.scale(nanos), 472);
        assert_eq!(Precision::Seconds.scale(-1), -1);
    }

    #[test]
    fn test_precision_parse() {
        assert_eq!("".parse::<Precision>(), Ok(Precision::Nanoseconds));
        assert_eq!("ms".parse::<Precision>(), Ok(Precision::Milliseconds));
        assert_eq!("us".parse::<Precision>(), Ok(Precision::Microseconds));
        assert!("days".parse::<Precision>().is_err());
    }

    #[test]
    fn test_batch_config_deserializes_precision_names() {
        let config: BatchPointsConfig =
            serde_json::from_str(r#"{"database":"logs","precision":"ms"}"#)
                .expect("failed to parse batch config");
        assert_eq!(config.database, "logs");
        assert_eq!(config.precision, Precision::Milliseconds);
        assert_eq!(config.retention_policy, None);
    }
}
