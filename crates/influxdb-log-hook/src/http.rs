// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`PointWriter`] over the InfluxDB HTTP write API.
//!
//! Batches are sent as one `POST {url}/write` request whose body is the line
//! protocol encoding. Database, retention policy, precision and write
//! consistency travel as query parameters.

use crate::config::InfluxDbConfig;
use crate::errors::WriteError;
use crate::writer::{BatchPoints, PointWriter};
use async_trait::async_trait;
use core::time::Duration;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

const WRITE_PATH: &str = "/write";
const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone)]
enum Auth {
    None,
    Basic {
        username: String,
        password: Option<String>,
    },
    Token(String),
}

#[derive(Debug, Clone)]
pub struct HttpWriter {
    client: reqwest::Client,
    write_url: String,
    auth: Auth,
}

impl HttpWriter {
    pub fn new(config: &InfluxDbConfig) -> Result<Self, WriteError> {
        let client = build_client(config).map_err(|e| WriteError::Build(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Uses a caller-provided client, e.g. one with custom TLS settings.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &InfluxDbConfig) -> Self {
        let auth = match (&config.token, &config.username) {
            (Some(token), _) => Auth::Token(token.clone()),
            (None, Some(username)) => Auth::Basic {
                username: username.clone(),
                password: config.password.clone(),
            },
            (None, None) => Auth::None,
        };
        Self {
            client,
            write_url: format!("{}{WRITE_PATH}", config.url.trim().trim_end_matches('/')),
            auth,
        }
    }

    fn create_request(&self, batch: &BatchPoints) -> reqwest::RequestBuilder {
        let config = &batch.config;
        let mut query = vec![
            ("db", config.database.as_str()),
            ("precision", config.precision.as_str()),
        ];
        if let Some(rp) = &config.retention_policy {
            query.push(("rp", rp.as_str()));
        }
        if let Some(consistency) = &config.write_consistency {
            query.push(("consistency", consistency.as_str()));
        }

        let request = self
            .client
            .post(&self.write_url)
            .query(&query)
            .header(CONTENT_TYPE, CONTENT_TYPE_TEXT)
            .body(batch.to_line_protocol());

        match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::Token(token) => request.header(AUTHORIZATION, format!("Token {token}")),
        }
    }
}

#[async_trait]
impl PointWriter for HttpWriter {
    async fn write(&self, batch: &BatchPoints) -> Result<(), WriteError> {
        if batch.is_empty() {
            return Ok(());
        }

        let response = self
            .create_request(batch)
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Wrote {} points, status {}", batch.len(), status);
            return Ok(());
        }

        // The body carries the server's reason for rejecting the write.
        let body = response.text().await.unwrap_or_default();
        Err(WriteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn build_client(config: &InfluxDbConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if let Some(proxy) = &config.https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }

    builder.build()
}
