// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// The point could not be constructed from the log record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidPointError {
    #[error("measurement name must not be empty")]
    EmptyMeasurement,

    #[error("tag key must not be empty")]
    EmptyTagKey,

    #[error("field key must not be empty")]
    EmptyFieldKey,

    #[error("point must have at least one field")]
    NoFields,

    #[error("key '{0}' is used both as a tag and as a field")]
    DuplicateKey(String),

    #[error("field '{0}' holds a value that cannot be written")]
    Unrepresentable(String),

    #[error("timestamp is outside the representable nanosecond range")]
    TimestampOutOfRange,
}

/// The point was not accepted by the dispatcher queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("dispatcher queue is full")]
    QueueFull,

    #[error("dispatcher is shut down")]
    Closed,
}

/// A backing-store write failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WriteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{status}: write rejected: {body}")]
    Status { status: u16, body: String },

    #[error("failed to build write request: {0}")]
    Build(String),
}

/// A flush attempt of the pending batch failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlushError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("write did not complete within {0:?}")]
    Timeout(Duration),
}

/// Returned to the logging call site by [`crate::hook::Hook::fire`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HookError {
    #[error("invalid point: {0}")]
    InvalidPoint(#[from] InvalidPointError),

    #[error("failed to submit point: {0}")]
    Submit(#[from] SubmitError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
