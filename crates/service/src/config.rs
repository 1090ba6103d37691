//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected text or json, got {other}")),
        }
    }
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` (default `0.0.0.0`) and `PORT` (default `3000`)
/// - `RUST_LOG` tracing filter (default `info`), `LOG_FORMAT` `text` or `json`
/// - `DATABASE_URL`: PostgreSQL when set, in-memory store otherwise
/// - `DATABASE_MAX_CONNECTIONS` (default `10`)
/// - `INBOX_STALENESS_TOLERANCE_SECS` (default `5`, at most `86400`)
/// - `OUTBOX_POLL_INTERVAL_MS` (default `1000`), `OUTBOX_BATCH_SIZE` (default `100`)
/// - `OUTBOX_RETENTION_SECS`: how long published entries are kept (default `3600`)
/// - `BROKER_MAX_DELIVERY_ATTEMPTS` (default `5`), `BROKER_RETRY_BACKOFF_MS` (default `200`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub staleness_tolerance_secs: u64,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: usize,
    pub outbox_retention: Duration,
    pub broker_max_attempts: u32,
    pub broker_retry_backoff: Duration,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults for
    /// missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&lookup, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
            database_url: text("DATABASE_URL"),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            staleness_tolerance_secs: staleness_tolerance(&lookup)?
                .unwrap_or(defaults.staleness_tolerance_secs),
            outbox_poll_interval: parse(&lookup, "OUTBOX_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.outbox_poll_interval),
            outbox_batch_size: parse(&lookup, "OUTBOX_BATCH_SIZE")?
                .unwrap_or(defaults.outbox_batch_size),
            outbox_retention: parse(&lookup, "OUTBOX_RETENTION_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.outbox_retention),
            broker_max_attempts: parse(&lookup, "BROKER_MAX_DELIVERY_ATTEMPTS")?
                .unwrap_or(defaults.broker_max_attempts),
            broker_retry_backoff: parse(&lookup, "BROKER_RETRY_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.broker_retry_backoff),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            staleness_tolerance_secs: inbox::StalenessPolicy::DEFAULT_TOLERANCE_SECS,
            outbox_poll_interval: Duration::from_millis(1000),
            outbox_batch_size: 100,
            outbox_retention: Duration::from_secs(3600),
            broker_max_attempts: 5,
            broker_retry_backoff: Duration::from_millis(200),
        }
    }
}

fn staleness_tolerance<F>(lookup: &F) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const KEY: &str = "INBOX_STALENESS_TOLERANCE_SECS";
    let max = inbox::StalenessPolicy::MAX_TOLERANCE_SECS;
    match parse::<u64, F>(lookup, KEY)? {
        Some(secs) if secs > max => Err(ConfigError::Invalid {
            key: KEY,
            value: secs.to_string(),
            reason: format!("must be at most {max}"),
        }),
        secs => Ok(secs),
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.staleness_tolerance_secs, 5);
        assert_eq!(config.outbox_batch_size, 100);
        assert_eq!(config.broker_retry_backoff, Duration::from_millis(200));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://ingest@localhost/ingest"),
            ("INBOX_STALENESS_TOLERANCE_SECS", "30"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("BROKER_MAX_DELIVERY_ATTEMPTS", "8"),
            ("OUTBOX_RETENTION_SECS", "600"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://ingest@localhost/ingest")
        );
        assert_eq!(config.staleness_tolerance_secs, 30);
        assert_eq!(config.outbox_poll_interval, Duration::from_millis(250));
        assert_eq!(config.broker_max_attempts, 8);
        assert_eq!(config.outbox_retention, Duration::from_secs(600));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = from_pairs(&[("PORT", "  "), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = from_pairs(&[("OUTBOX_BATCH_SIZE", "lots")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "OUTBOX_BATCH_SIZE", ref value, .. } if value == "lots"
        ));
    }

    #[test]
    fn test_oversized_staleness_tolerance_is_an_error() {
        let err = from_pairs(&[("INBOX_STALENESS_TOLERANCE_SECS", "10000000000000")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "INBOX_STALENESS_TOLERANCE_SECS", .. }
        ));
        assert!(from_pairs(&[("INBOX_STALENESS_TOLERANCE_SECS", "86400")]).is_ok());
    }

    #[test]
    fn test_invalid_log_format_is_an_error() {
        assert!(from_pairs(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
