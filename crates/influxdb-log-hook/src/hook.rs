// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::HookConfig;
use crate::dispatcher::{DispatcherHandle, DispatcherService, DispatcherTask, FlushFailure};
use crate::entry::LogEntry;
use crate::errors::{ConfigError, HookError};
use crate::level::{resolve_levels, Level};
use crate::point_builder::PointBuilder;
use crate::writer::PointWriter;
use tokio::sync::mpsc;

/// A sink invoked by the host logging facility for every log record.
pub trait Hook: Send + Sync {
    /// Severities this hook wants to receive. Records of any other
    /// severity are never handed to [`Hook::fire`].
    fn levels(&self) -> &[Level];

    /// Handles one record. Must not block on I/O.
    fn fire(&self, entry: &LogEntry) -> Result<(), HookError>;
}

impl<H: Hook + ?Sized> Hook for std::sync::Arc<H> {
    fn levels(&self) -> &[Level] {
        (**self).levels()
    }

    fn fire(&self, entry: &LogEntry) -> Result<(), HookError> {
        (**self).fire(entry)
    }
}

/// Forwards log records to InfluxDB through a batch dispatcher.
#[derive(Debug, Clone)]
pub struct InfluxDbHook {
    builder: PointBuilder,
    levels: Vec<Level>,
    dispatcher: DispatcherHandle,
}

impl InfluxDbHook {
    /// Validates `config` and starts the dispatcher worker on the current
    /// tokio runtime.
    ///
    /// The returned task flushes whatever is still pending when shut down.
    pub fn start<W: PointWriter + 'static>(
        config: HookConfig,
        writer: W,
    ) -> Result<(Self, DispatcherTask), ConfigError> {
        let (hook, service) = Self::new(config, writer)?;
        Ok((hook, service.spawn()))
    }

    /// Like [`InfluxDbHook::start`], also returning a channel of flush failures.
    pub fn start_with_failures<W: PointWriter + 'static>(
        config: HookConfig,
        writer: W,
    ) -> Result<(Self, DispatcherTask, mpsc::UnboundedReceiver<FlushFailure>), ConfigError> {
        let (hook, mut service) = Self::new(config, writer)?;
        let failures = service.subscribe_failures();
        Ok((hook, service.spawn(), failures))
    }

    /// Builds the hook and its dispatcher without starting the worker.
    pub fn new<W: PointWriter + 'static>(
        config: HookConfig,
        writer: W,
    ) -> Result<(Self, DispatcherService<W>), ConfigError> {
        config.validate()?;

        let HookConfig {
            metric,
            tag_fields,
            levels,
            batch,
            dispatcher,
        } = config;

        let (service, handle) = DispatcherService::new(dispatcher, batch, writer)?;
        let hook = Self {
            builder: PointBuilder::new(metric, tag_fields),
            levels: resolve_levels(&levels),
            dispatcher: handle,
        };
        Ok((hook, service))
    }

    #[must_use]
    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }
}

impl Hook for InfluxDbHook {
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn fire(&self, entry: &LogEntry) -> Result<(), HookError> {
        let point = self.builder.build(entry)?;
        self.dispatcher.submit(point)?;
        Ok(())
    }
}
