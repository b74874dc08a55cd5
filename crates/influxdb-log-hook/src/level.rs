// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log severities understood by the hook.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log record, from most to least severe.
///
/// The derived ordering follows declaration order, so `Level::Panic < Level::Debug`
/// and "more verbose" compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Panic,
    Fatal,
    Error,
    #[serde(alias = "warning")]
    Warn,
    Info,
    Debug,
}

/// Every level, most severe first. Used when no severity filter is configured.
pub const ALL_LEVELS: [Level; 6] = [
    Level::Panic,
    Level::Fatal,
    Level::Error,
    Level::Warn,
    Level::Info,
    Level::Debug,
];

impl Level {
    /// Canonical lowercase name, used as the `level` tag value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Panic => "panic",
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" | "trace" => Ok(Level::Debug),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            // DEBUG and TRACE both land on the most verbose level
            _ => Level::Debug,
        }
    }
}

/// Resolves a configured severity filter, falling back to [`ALL_LEVELS`] when empty.
#[must_use]
pub fn resolve_levels(levels: &[Level]) -> Vec<Level> {
    if levels.is_empty() {
        ALL_LEVELS.to_vec()
    } else {
        levels.to_vec()
    }
}
