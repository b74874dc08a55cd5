// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards this program's `tracing` events to InfluxDB.
//!
//! ```sh
//! INFLUXDB_URL=http://localhost:8086 INFLUXDB_DATABASE=logs \
//!   INFLUXDB_LOG_TAGS=user,service cargo run --example forward_tracing
//! ```

use std::env;
use std::time::Duration;

use influxdb_log_hook::{HookConfig, HttpWriter, InfluxDbConfig, InfluxDbHook, InfluxDbLayer};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = match EnvFilter::try_new(&log_level) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid RUST_LOG '{log_level}': {e}");
            return;
        }
    };

    let hook_config = match HookConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let writer = match InfluxDbConfig::from_env().map(|config| HttpWriter::new(&config)) {
        Ok(Ok(writer)) => writer,
        Ok(Err(e)) => {
            eprintln!("Failed to create InfluxDB writer: {e}");
            return;
        }
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let (hook, task) = match InfluxDbHook::start(hook_config, writer) {
        Ok(started) => started,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    // The filter only applies to console output; the hook has its own severity filter.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(InfluxDbLayer::new(hook))
        .init();

    info!(target: "checkout", service = "checkout", "service started");
    for attempt in 1..=3i64 {
        warn!(
            target: "checkout",
            service = "checkout",
            user = "alice",
            attempt,
            latency_ms = 250.0 * attempt as f64,
            "payment provider is slow"
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    error!(target: "checkout", service = "checkout", user = "alice", "payment declined");
    debug!(target: "checkout", "shutting down");

    match task.shutdown().await {
        Ok(stats) => info!(
            "Forwarded {} points in {} writes, {} dropped",
            stats.flushed_points,
            stats.flushes,
            stats.dropped_points + stats.refused_points
        ),
        Err(e) => error!("Dispatcher worker failed: {e}"),
    }
}
