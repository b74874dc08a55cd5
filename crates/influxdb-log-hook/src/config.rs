// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Construction-time configuration.
//!
//! Everything is fixed once the hook is started. Each config can be built
//! in code or read from `INFLUXDB_*` environment variables.

use crate::errors::ConfigError;
use crate::level::Level;
use crate::writer::{BatchPointsConfig, Precision};
use std::env;
use std::time::Duration;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_MAX_FLUSH_ATTEMPTS: u32 = 3;
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_URL: &str = "http://localhost:8086";
const DEFAULT_METRIC: &str = "logs";

/// What a producer does when the dispatcher queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backpressure {
    /// Wait for the worker to make room. Never loses a point, except on a
    /// current-thread runtime where waiting would starve the worker itself.
    #[default]
    Block,
    /// Refuse the incoming point and count it as dropped.
    DropNewest,
}

impl std::str::FromStr for Backpressure {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(Backpressure::Block),
            "drop" | "drop_newest" => Ok(Backpressure::DropNewest),
            other => Err(ConfigError::Invalid(format!(
                "Invalid backpressure policy '{other}'. Must be one of: block, drop"
            ))),
        }
    }
}

/// Batch dispatcher settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Period of the time-based flush trigger.
    pub flush_interval: Duration,
    /// Pending-batch length that triggers a size-based flush.
    pub batch_size: usize,
    /// Queue capacity, `batch_size` when unset. Never above `batch_size`.
    pub queue_capacity: Option<usize>,
    pub backpressure: Backpressure,
    /// Consecutive failed flushes after which the pending batch is dropped.
    pub max_flush_attempts: u32,
    /// Upper bound on a single backing-store write.
    pub flush_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: None,
            backpressure: Backpressure::default(),
            max_flush_attempts: DEFAULT_MAX_FLUSH_ATTEMPTS,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }
}

impl DispatcherConfig {
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.batch_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "flush interval must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity() == 0 {
            return Err(ConfigError::Invalid(
                "queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity() > self.batch_size {
            return Err(ConfigError::Invalid(format!(
                "queue capacity {} must not exceed batch size {}",
                self.queue_capacity(),
                self.batch_size
            )));
        }
        if self.max_flush_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max flush attempts must be greater than 0".to_string(),
            ));
        }
        if self.flush_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "flush timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let backpressure = match lookup("INFLUXDB_BACKPRESSURE") {
            Some(val) => val.parse()?,
            None => defaults.backpressure,
        };
        Ok(Self {
            flush_interval: parse_millis(lookup, "INFLUXDB_FLUSH_INTERVAL_MS")
                .unwrap_or(defaults.flush_interval),
            batch_size: parse_number(lookup, "INFLUXDB_BATCH_SIZE").unwrap_or(defaults.batch_size),
            queue_capacity: parse_number(lookup, "INFLUXDB_QUEUE_CAPACITY"),
            backpressure,
            max_flush_attempts: parse_number(lookup, "INFLUXDB_MAX_FLUSH_ATTEMPTS")
                .unwrap_or(defaults.max_flush_attempts),
            flush_timeout: parse_millis(lookup, "INFLUXDB_FLUSH_TIMEOUT_MS")
                .unwrap_or(defaults.flush_timeout),
        })
    }
}

/// Settings of the hook itself: what to write and how to batch it.
#[derive(Debug, Clone, PartialEq)]
pub struct HookConfig {
    /// Measurement every point is written to.
    pub metric: String,
    /// Entry fields promoted to tags.
    pub tag_fields: Vec<String>,
    /// Severities the hook handles; all levels when empty.
    pub levels: Vec<Level>,
    pub batch: BatchPointsConfig,
    pub dispatcher: DispatcherConfig,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            metric: DEFAULT_METRIC.to_string(),
            tag_fields: Vec::new(),
            levels: Vec::new(),
            batch: BatchPointsConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl HookConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let metric = lookup("INFLUXDB_LOG_METRIC").unwrap_or_else(|| DEFAULT_METRIC.to_string());
        let tag_fields = lookup("INFLUXDB_LOG_TAGS")
            .map(|val| split_list(&val))
            .unwrap_or_default();
        let levels = lookup("INFLUXDB_LOG_LEVELS")
            .map(|val| {
                split_list(&val)
                    .iter()
                    .map(|level| level.parse::<Level>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?
            .unwrap_or_default();
        let precision = lookup("INFLUXDB_PRECISION")
            .map(|val| val.parse::<Precision>())
            .transpose()
            .map_err(ConfigError::Invalid)?
            .unwrap_or_default();

        let config = Self {
            metric,
            tag_fields,
            levels,
            batch: BatchPointsConfig {
                database: lookup("INFLUXDB_DATABASE").unwrap_or_default(),
                retention_policy: lookup("INFLUXDB_RETENTION_POLICY"),
                precision,
                write_consistency: lookup("INFLUXDB_WRITE_CONSISTENCY"),
            },
            dispatcher: DispatcherConfig::from_lookup(lookup)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metric.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metric name cannot be empty".to_string(),
            ));
        }
        if self.batch.database.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "INFLUXDB_DATABASE cannot be empty".to_string(),
            ));
        }
        if let Some(consistency) = &self.batch.write_consistency {
            let valid = ["any", "one", "quorum", "all"];
            if !valid.contains(&consistency.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Invalid write consistency '{consistency}'. Must be one of: any, one, quorum, all"
                )));
            }
        }
        self.dispatcher.validate()
    }
}

/// Connection settings of the HTTP writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxDbConfig {
    /// Base URL, e.g. `http://localhost:8086`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// InfluxDB 2.x API token, sent as `Authorization: Token ...`.
    pub token: Option<String>,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    pub timeout: Duration,
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            token: None,
            https_proxy: None,
            timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }
}

impl InfluxDbConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            url: lookup("INFLUXDB_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            username: lookup("INFLUXDB_USERNAME"),
            password: lookup("INFLUXDB_PASSWORD"),
            token: lookup("INFLUXDB_TOKEN"),
            https_proxy: lookup("INFLUXDB_PROXY_HTTPS").or_else(|| lookup("HTTPS_PROXY")),
            timeout: parse_millis(lookup, "INFLUXDB_TIMEOUT_MS").unwrap_or(DEFAULT_FLUSH_TIMEOUT),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "INFLUXDB_URL must be an http(s) URL, got '{url}'"
            )));
        }
        if self.token.is_some() && self.username.is_some() {
            return Err(ConfigError::Invalid(
                "INFLUXDB_TOKEN and INFLUXDB_USERNAME are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|val| val.trim().parse::<T>().ok())
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    parse_number::<u64>(lookup, key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn valid_hook_config() -> HookConfig {
        HookConfig {
            batch: BatchPointsConfig {
                database: "logs".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_dispatcher_config_is_valid() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_capacity(), config.batch_size);
    }

    #[test]
    fn test_validate_zero_values() {
        let zero_batch = DispatcherConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(zero_batch.validate().is_err());

        let zero_queue = DispatcherConfig {
            queue_capacity: Some(0),
            ..Default::default()
        };
        assert!(zero_queue.validate().is_err());

        let oversized_queue = DispatcherConfig {
            batch_size: 10,
            queue_capacity: Some(11),
            ..Default::default()
        };
        assert_eq!(
            oversized_queue.validate(),
            Err(ConfigError::Invalid(
                "queue capacity 11 must not exceed batch size 10".to_string()
            ))
        );

        let smaller_queue = DispatcherConfig {
            batch_size: 10,
            queue_capacity: Some(4),
            ..Default::default()
        };
        assert!(smaller_queue.validate().is_ok());

        let zero_interval = DispatcherConfig {
            flush_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let zero_attempts = DispatcherConfig {
            max_flush_attempts: 0,
            ..Default::default()
        };
        assert!(zero_attempts.validate().is_err());
    }

    #[test]
    fn test_hook_config_requires_database() {
        assert!(HookConfig::default().validate().is_err());
        assert!(valid_hook_config().validate().is_ok());
    }

    #[test]
    fn test_validate_write_consistency() {
        let mut config = valid_hook_config();
        config.batch.write_consistency = Some("quorum".to_string());
        assert!(config.validate().is_ok());
        config.batch.write_consistency = Some("most".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hook_config_from_lookup() {
        let lookup = lookup_from(&[
            ("INFLUXDB_DATABASE", "app"),
            ("INFLUXDB_RETENTION_POLICY", "week"),
            ("INFLUXDB_PRECISION", "ms"),
            ("INFLUXDB_LOG_METRIC", "app_logs"),
            ("INFLUXDB_LOG_TAGS", "user, request_id,,"),
            ("INFLUXDB_LOG_LEVELS", "error,warn"),
            ("INFLUXDB_FLUSH_INTERVAL_MS", "250"),
            ("INFLUXDB_BATCH_SIZE", "50"),
            ("INFLUXDB_BACKPRESSURE", "drop"),
        ]);
        let config = HookConfig::from_lookup(&lookup).expect("failed to load config");

        assert_eq!(config.metric, "app_logs");
        assert_eq!(config.tag_fields, vec!["user", "request_id"]);
        assert_eq!(config.levels, vec![Level::Error, Level::Warn]);
        assert_eq!(config.batch.database, "app");
        assert_eq!(config.batch.retention_policy.as_deref(), Some("week"));
        assert_eq!(config.batch.precision, Precision::Milliseconds);
        assert_eq!(config.dispatcher.flush_interval, Duration::from_millis(250));
        assert_eq!(config.dispatcher.batch_size, 50);
        assert_eq!(config.dispatcher.queue_capacity(), 50);
        assert_eq!(config.dispatcher.backpressure, Backpressure::DropNewest);
        assert_eq!(
            config.dispatcher.max_flush_attempts,
            DEFAULT_MAX_FLUSH_ATTEMPTS
        );
    }

    #[test]
    fn test_hook_config_ignores_malformed_numbers() {
        let lookup = lookup_from(&[
            ("INFLUXDB_DATABASE", "app"),
            ("INFLUXDB_BATCH_SIZE", "lots"),
        ]);
        let config = HookConfig::from_lookup(&lookup).expect("failed to load config");
        assert_eq!(config.dispatcher.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_hook_config_rejects_unknown_level() {
        let lookup = lookup_from(&[
            ("INFLUXDB_DATABASE", "app"),
            ("INFLUXDB_LOG_LEVELS", "error,loud"),
        ]);
        let err = HookConfig::from_lookup(&lookup).expect_err("level should be rejected");
        assert_eq!(
            err,
            ConfigError::Invalid("unknown log level 'loud'".to_string())
        );
    }

    #[test]
    fn test_influxdb_config_from_lookup() {
        let lookup = lookup_from(&[
            ("INFLUXDB_URL", "https://influx.example.com:8086"),
            ("INFLUXDB_TOKEN", "secret"),
            ("HTTPS_PROXY", "http://proxy:3128"),
            ("INFLUXDB_TIMEOUT_MS", "1500"),
        ]);
        let config = InfluxDbConfig::from_lookup(&lookup).expect("failed to load config");

        assert_eq!(config.url, "https://influx.example.com:8086");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.https_proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_influxdb_config_rejects_bad_url_and_mixed_auth() {
        let config = InfluxDbConfig {
            url: "localhost:8086".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = InfluxDbConfig {
            username: Some("u".to_string()),
            token: Some("t".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
