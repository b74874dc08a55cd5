// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

// The global subscriber can only be installed once per process, so this file
// holds a single test.

use async_trait::async_trait;
use influxdb_log_hook::{
    BatchPoints, BatchPointsConfig, DispatcherConfig, HookConfig, HttpWriter, InfluxDbConfig,
    InfluxDbHook, InfluxDbLayer, PointWriter, Precision, WriteError,
};
use mockito::{Matcher, Server};
use tokio::time::{timeout, Duration};
use tracing_subscriber::prelude::*;

// Logs under a target the layer does not know about before every write.
struct LoggingWriter {
    inner: HttpWriter,
}

#[async_trait]
impl PointWriter for LoggingWriter {
    async fn write(&self, batch: &BatchPoints) -> Result<(), WriteError> {
        tracing::debug!(target: "storage_client", points = batch.len(), "sending batch");
        self.inner.write(batch).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn global_layer_with_all_levels_ships_only_application_events() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/write")
        .match_query(Matcher::UrlEncoded("db".into(), "telemetry".into()))
        .match_body(Matcher::Regex(
            r#"^app_logs,level=info message="order placed" \d+\n$"#.to_string(),
        ))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let config = HookConfig {
        metric: "app_logs".to_string(),
        batch: BatchPointsConfig {
            database: "telemetry".to_string(),
            precision: Precision::Seconds,
            ..Default::default()
        },
        dispatcher: DispatcherConfig {
            batch_size: 1,
            flush_interval: Duration::from_secs(3600),
            ..Default::default()
        },
        ..Default::default()
    };
    let writer = LoggingWriter {
        inner: HttpWriter::new(&InfluxDbConfig {
            url: server.url(),
            ..Default::default()
        })
        .expect("failed to build writer"),
    };
    let (hook, task) = InfluxDbHook::start(config, writer).expect("failed to start hook");

    tracing_subscriber::registry()
        .with(InfluxDbLayer::new(hook))
        .init();

    tracing::info!(target: "checkout", "order placed");
    tokio::time::sleep(Duration::from_millis(500)).await;

    let stats = timeout(Duration::from_secs(5), task.shutdown())
        .await
        .expect("worker did not stop")
        .expect("worker panicked");
    mock.assert_async().await;
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.flushed_points, 1);
    assert_eq!(stats.refused_points, 0);
}
