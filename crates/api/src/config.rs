//! Application configuration loaded from environment variables.

use std::time::Duration;

use notifications::DispatcherConfig;
use saga::SagaConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres state store; unset keeps state in memory
/// - `DAPR_HTTP_ENDPOINT`: sidecar for pub/sub and inventory calls; unset
///   runs an in-process bus and inventory
/// - `AVAILABILITY_TIMEOUT_MS`: inventory check bound (default: `2000`)
/// - `NOTIFICATION_SEND_TIMEOUT_MS`: per-channel send bound (default: `5000`)
/// - `LOW_STOCK_THRESHOLD`: inventory alert threshold (default: `10`)
/// - `ADMIN_EMAIL`: low-stock alert recipient (default: `"admin@example.com"`)
/// - `ADMIN_WEBHOOK_URL`: optional low-stock webhook
/// - `UPDATE_MAX_RETRIES`: conditional write attempts (default: `3`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub dapr_http_endpoint: Option<String>,
    pub availability_timeout: Duration,
    pub notification_send_timeout: Duration,
    pub low_stock_threshold: i64,
    pub admin_email: String,
    pub admin_webhook_url: Option<String>,
    pub update_max_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from any variable source. Unparseable values
    /// fall back to their defaults; empty strings count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let millis = |name: &str, default: Duration| {
            var(name)
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            dapr_http_endpoint: var("DAPR_HTTP_ENDPOINT")
                .map(|e| e.trim_end_matches('/').to_string()),
            availability_timeout: millis("AVAILABILITY_TIMEOUT_MS", defaults.availability_timeout),
            notification_send_timeout: millis(
                "NOTIFICATION_SEND_TIMEOUT_MS",
                defaults.notification_send_timeout,
            ),
            low_stock_threshold: var("LOW_STOCK_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.low_stock_threshold),
            admin_email: var("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            admin_webhook_url: var("ADMIN_WEBHOOK_URL"),
            update_max_retries: var("UPDATE_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.update_max_retries),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            availability_timeout: self.availability_timeout,
            max_update_attempts: self.update_max_retries,
            ..SagaConfig::default()
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            send_timeout: self.notification_send_timeout,
            low_stock_threshold: self.low_stock_threshold,
            admin_email: self.admin_email.clone(),
            admin_webhook_url: self.admin_webhook_url.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let saga = SagaConfig::default();
        let dispatcher = DispatcherConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            dapr_http_endpoint: None,
            availability_timeout: saga.availability_timeout,
            notification_send_timeout: dispatcher.send_timeout,
            low_stock_threshold: dispatcher.low_stock_threshold,
            admin_email: dispatcher.admin_email,
            admin_webhook_url: None,
            update_max_retries: saga.max_update_attempts,
        }
    }
}
