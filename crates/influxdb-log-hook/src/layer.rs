// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bridges `tracing` events into a [`Hook`].
//!
//! ```rust,ignore
//! use tracing_subscriber::prelude::*;
//!
//! let (hook, task) = InfluxDbHook::start(config, writer)?;
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(InfluxDbLayer::new(hook))
//!     .init();
//! ```

use crate::dispatcher::in_worker_task;
use crate::entry::LogEntry;
use crate::hook::Hook;
use crate::level::Level;
use crate::point_builder::MESSAGE_FIELD;
use crate::value::Value;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

// Events emitted by this crate are never forwarded, or the dispatcher's own
// diagnostics would be queued back into itself.
const OWN_TARGET: &str = "influxdb_log_hook";

// The HTTP stack logs from connection tasks spawned outside the dispatcher
// worker, so every write would otherwise produce new points.
const HTTP_STACK_TARGETS: &[&str] = &[
    "hyper",
    "hyper_util",
    "h2",
    "reqwest",
    "rustls",
    "want",
    "mio",
    "tower",
    "tokio",
    "tokio_util",
];

/// A [`Layer`] that hands every enabled event to a [`Hook`].
///
/// Events logged on the dispatcher worker task are skipped, as are events
/// from this crate and from the HTTP stack the writer runs on.
#[derive(Debug, Clone)]
pub struct InfluxDbLayer<H> {
    hook: H,
    ignored_targets: Vec<String>,
}

impl<H: Hook> InfluxDbLayer<H> {
    pub fn new(hook: H) -> Self {
        let ignored_targets = std::iter::once(OWN_TARGET)
            .chain(HTTP_STACK_TARGETS.iter().copied())
            .map(ToString::to_string)
            .collect();
        Self {
            hook,
            ignored_targets,
        }
    }

    /// Also skips events whose target is `target` or one of its submodules.
    ///
    /// Needed for crates a custom [`PointWriter`](crate::writer::PointWriter)
    /// logs from outside the worker task.
    #[must_use]
    pub fn with_ignored_target(mut self, target: impl Into<String>) -> Self {
        self.ignored_targets.push(target.into());
        self
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets
            .iter()
            .any(|ignored| target_matches(target, ignored))
    }
}

impl<S, H> Layer<S> for InfluxDbLayer<H>
where
    S: Subscriber,
    H: Hook + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if in_worker_task() || self.is_ignored(metadata.target()) {
            return;
        }

        let level = Level::from(metadata.level());
        if !self.hook.levels().contains(&level) {
            return;
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            time: Utc::now(),
            level,
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };

        // A subscriber has no caller to report to; drops show up in the
        // dispatcher's counters.
        let _ = self.hook.fire(&entry);
    }
}

fn target_matches(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

#[derive(Default)]
struct EntryVisitor {
    message: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl EntryVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for EntryVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::Float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Integer(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::UInteger(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Boolean(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}
