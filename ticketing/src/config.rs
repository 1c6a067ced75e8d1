//! Configuration management for the booking engine.
//!
//! Loads configuration from environment variables with sensible defaults. The binary
//! reads an optional `.env` file first via `dotenvy`.

use crate::retry::RetryPolicy;
use crate::service::DEFAULT_MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use ticketing_postgres::{IsolationLevel, PostgresSettings};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `PostgreSQL` configuration
    pub database: DatabaseConfig,
    /// Booking service limits
    pub booking: BookingConfig,
    /// Retry wrapper configuration
    pub retry: RetryConfig,
    /// Logging and metrics
    pub observability: ObservabilityConfig,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (the in-memory store is used when unset)
    pub url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Lock wait limit per unit of work, in milliseconds
    pub lock_timeout_ms: u64,
    /// Transaction isolation for units of work
    pub isolation: IsolationLevel,
}

/// Booking service limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Largest accepted page size
    pub max_page_size: u32,
}

/// Retry wrapper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Re-runs after the first attempt
    pub max_attempts: u32,
    /// First backoff delay in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
}

/// Logging and metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `tracing` filter directive
    pub log_level: String,
    /// Prometheus exporter host
    pub metrics_host: String,
    /// Prometheus exporter port
    pub metrics_port: u16,
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parsed(&lookup, "DATABASE_MIN_CONNECTIONS", 2),
                connect_timeout: parsed(&lookup, "DATABASE_CONNECT_TIMEOUT", 30),
                lock_timeout_ms: parsed(&lookup, "DATABASE_LOCK_TIMEOUT_MS", 5_000),
                isolation: lookup("DATABASE_ISOLATION")
                    .and_then(|s| IsolationLevel::parse(s.trim()))
                    .unwrap_or_default(),
            },
            booking: BookingConfig {
                max_page_size: parsed(&lookup, "BOOKING_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE),
            },
            retry: RetryConfig {
                max_attempts: parsed(&lookup, "RETRY_MAX_ATTEMPTS", 3),
                initial_delay_ms: parsed(&lookup, "RETRY_INITIAL_DELAY_MS", 25),
                max_delay_ms: parsed(&lookup, "RETRY_MAX_DELAY_MS", 500),
            },
            observability: ObservabilityConfig {
                log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
                metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: parsed(&lookup, "METRICS_PORT", 9090),
            },
        }
    }

    /// Pool and transaction settings for [`ticketing_postgres::PostgresStore`].
    #[must_use]
    pub const fn postgres_settings(&self) -> PostgresSettings {
        PostgresSettings {
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout: Duration::from_secs(self.database.connect_timeout),
            lock_timeout: Duration::from_millis(self.database.lock_timeout_ms),
            isolation: self.database.isolation,
        }
    }

    /// Backoff policy for [`crate::retry::retry_transient`].
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.retry.max_attempts)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .build()
    }

    /// `host:port` the Prometheus exporter listens on
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!(
            "{}:{}",
            self.observability.metrics_host, self.observability.metrics_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]);
        assert_eq!(config.database.url, None);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.min_connections, 2);
        assert_eq!(config.database.isolation, IsolationLevel::ReadCommitted);
        assert_eq!(config.booking.max_page_size, 100);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.metrics_address(), "0.0.0.0:9090");

        let settings = config.postgres_settings();
        assert_eq!(settings.lock_timeout, Duration::from_millis(5_000));
        assert_eq!(settings.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/ticketing"),
            ("DATABASE_ISOLATION", "serializable"),
            ("DATABASE_LOCK_TIMEOUT_MS", "250"),
            ("BOOKING_MAX_PAGE_SIZE", "20"),
            ("RETRY_MAX_ATTEMPTS", "7"),
            ("METRICS_PORT", "9100"),
        ]);
        assert_eq!(config.database.url.as_deref(), Some("postgres://db/ticketing"));
        assert_eq!(config.database.isolation, IsolationLevel::Serializable);
        assert_eq!(config.postgres_settings().lock_timeout, Duration::from_millis(250));
        assert_eq!(config.booking.max_page_size, 20);
        assert_eq!(config.retry_policy().max_retries, 7);
        assert_eq!(config.metrics_address(), "0.0.0.0:9100");
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = config_from(&[
            ("DATABASE_URL", "  "),
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("DATABASE_ISOLATION", "chaos"),
        ]);
        assert_eq!(config.database.url, None);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.isolation, IsolationLevel::ReadCommitted);
    }
}
