// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards structured log records to InfluxDB as batched time-series points.
//!
//! ```text
//! tracing event ─> InfluxDbLayer ─> InfluxDbHook::fire ─> PointBuilder
//!                                                            │
//!                                        DispatcherHandle::submit
//!                                                            │ bounded queue
//!                                                            v
//!                                 DispatcherService (worker) ─> PointWriter
//! ```
//!
//! Producers never perform network I/O. A single worker owns the pending
//! batch and flushes it when it reaches `batch_size` points or when the flush
//! interval elapses, whichever comes first.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod dispatcher;
pub mod entry;
pub mod errors;
pub mod hook;
pub mod http;
pub mod layer;
pub mod level;
pub mod point;
pub mod point_builder;
pub mod value;
pub mod writer;

pub use config::{Backpressure, DispatcherConfig, HookConfig, InfluxDbConfig};
pub use dispatcher::{
    DispatcherHandle, DispatcherService, DispatcherStats, DispatcherTask, FlushFailure,
};
pub use entry::LogEntry;
pub use errors::{ConfigError, FlushError, HookError, InvalidPointError, SubmitError, WriteError};
pub use hook::{Hook, InfluxDbHook};
pub use http::HttpWriter;
pub use layer::InfluxDbLayer;
pub use level::Level;
pub use point::Point;
pub use point_builder::PointBuilder;
pub use value::Value;
pub use writer::{BatchPoints, BatchPointsConfig, PointWriter, Precision};
