//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use domain::SweeperConfig;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset means in-memory storage
/// - `CATALOG_PATH`: JSON catalog file; unset means an empty catalog
/// - `SWEEP_INTERVAL_SECS`: seconds between expiry sweeps (default: `300`)
/// - `IDLE_TIMEOUT_SECS`: idle time before a basket is retired (default: `1800`)
/// - `AUDIT_RETRY_ATTEMPTS`: audit append attempts per mutation (default: `3`)
///
/// Unparseable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub idle_timeout: Duration,
    pub audit_retry_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|&s| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            database_url: non_empty("DATABASE_URL"),
            catalog_path: non_empty("CATALOG_PATH").map(PathBuf::from),
            sweep_interval: secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            idle_timeout: secs("IDLE_TIMEOUT_SECS", defaults.idle_timeout),
            audit_retry_attempts: lookup("AUDIT_RETRY_ATTEMPTS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|&n: &u32| n > 0)
                .unwrap_or(defaults.audit_retry_attempts),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweeper(&self) -> SweeperConfig {
        SweeperConfig {
            interval: self.sweep_interval,
            idle_timeout: self.idle_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let sweeper = SweeperConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            catalog_path: None,
            sweep_interval: sweeper.interval,
            idle_timeout: sweeper.idle_timeout,
            audit_retry_attempts: 3,
        }
    }
}
