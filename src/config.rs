//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files, applies environment overrides,
//! and defines defaults for logging, the Elasticsearch transport and the HTTP listener.
//! `AppConfig` is the root configuration struct containing all settings.

use chrono::{FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;

use crate::logging::{LogClock, LogLevel};

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Crate name as it appears in tracing targets
pub const CRATE_TARGET: &str = "monorepo_api";

/// Target of records written by request-scoped loggers
pub const REQUEST_LOG_TARGET: &str = formatcp!("{}::request", CRATE_TARGET);

/// Default log filter when RUST_LOG is not set. Request records are already
/// filtered by `logging.level`, so their target is let through entirely.
pub const DEFAULT_LOG_FILTER: &str =
    formatcp!("info,{}=debug,{}=trace", CRATE_TARGET, REQUEST_LOG_TARGET);

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Default timezone used when formatting record timestamps
pub const DEFAULT_TIMEZONE: &str = "local";

/// Application name used when none is configured
pub const DEFAULT_APPLICATION_NAME: &str = env!("CARGO_PKG_NAME");

/// Health responses must never be served from a cache
pub const CACHE_CONTROL_HEALTH: &str = "no-store";

// =============================================================================
// Elasticsearch Transport Constants
// =============================================================================

/// Index prefix; the year-month suffix is appended per record
pub const DEFAULT_INDEX_PREFIX: &str = "monorepo-logs";

/// Bulk buffer size in bytes that triggers a flush
pub const DEFAULT_FLUSH_BYTES: usize = 16 * 1024;

/// Records queued for the shipping task before new ones are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Seconds after which buffered records are shipped regardless of size
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Timeout for a single bulk request
pub const DEFAULT_ES_TIMEOUT_SECS: u64 = 10;

/// Time allowed for the shipping task to drain on shutdown
pub const LOG_DRAIN_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Environment Overrides
// =============================================================================

/// Overrides `logging.timezone`
pub const ENV_TIMEZONE: &str = "LOG_TIMEZONE";

/// Overrides (or enables) `logging.elasticsearch.url`
pub const ENV_ELASTICSEARCH_URL: &str = "ELASTICSEARCH_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub application: ApplicationConfig,
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationConfig {
    /// Display name reported by the health endpoint and bound to every log record.
    /// Defaults to the package name.
    pub name: Option<String>,
}

impl ApplicationConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_APPLICATION_NAME)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level for request-scoped loggers
    #[serde(default)]
    pub level: LogLevel,
    /// Console format: "text" (human-readable, colorized, default) or "json"
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
    /// "local", "utc", an IANA name such as "America/Sao_Paulo",
    /// or a fixed offset such as "+05:30"
    #[serde(default = "LoggingConfig::default_timezone")]
    pub timezone: String,
    /// Remote log store; shipping is disabled when absent
    pub elasticsearch: Option<ElasticsearchConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: Self::default_format(),
            timezone: Self::default_timezone(),
            elasticsearch: None,
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    fn default_timezone() -> String {
        DEFAULT_TIMEZONE.to_string()
    }

    /// Whether the console layer should emit JSON lines
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    /// Clock for the configured timezone.
    pub fn clock(&self) -> Result<LogClock, ConfigError> {
        parse_timezone(&self.timezone)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster, e.g. "http://localhost:9200"
    pub url: String,
    #[serde(default = "ElasticsearchConfig::default_index_prefix")]
    pub index_prefix: String,
    #[serde(default = "ElasticsearchConfig::default_flush_bytes")]
    pub flush_bytes: usize,
    #[serde(default = "ElasticsearchConfig::default_flush_interval")]
    pub flush_interval_secs: u64,
    #[serde(default = "ElasticsearchConfig::default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "ElasticsearchConfig::default_timeout")]
    pub timeout_seconds: u64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ElasticsearchConfig {
    /// Config pointing at `url` with every other setting defaulted
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index_prefix: Self::default_index_prefix(),
            flush_bytes: Self::default_flush_bytes(),
            flush_interval_secs: Self::default_flush_interval(),
            queue_capacity: Self::default_queue_capacity(),
            timeout_seconds: Self::default_timeout(),
            username: None,
            password: None,
        }
    }

    fn default_index_prefix() -> String {
        DEFAULT_INDEX_PREFIX.to_string()
    }

    fn default_flush_bytes() -> usize {
        DEFAULT_FLUSH_BYTES
    }

    fn default_flush_interval() -> u64 {
        DEFAULT_FLUSH_INTERVAL_SECS
    }

    fn default_queue_capacity() -> usize {
        DEFAULT_QUEUE_CAPACITY
    }

    fn default_timeout() -> u64 {
        DEFAULT_ES_TIMEOUT_SECS
    }

    /// Check if basic auth is configured (both username and password)
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&contents)?;

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tz) = lookup(ENV_TIMEZONE).filter(|v| !v.trim().is_empty()) {
            self.logging.timezone = tz;
        }

        if let Some(url) = lookup(ENV_ELASTICSEARCH_URL).filter(|v| !v.trim().is_empty()) {
            match self.logging.elasticsearch.as_mut() {
                Some(es) => es.url = url,
                None => self.logging.elasticsearch = Some(ElasticsearchConfig::with_url(url)),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.clock()?;

        if let Some(es) = &self.logging.elasticsearch {
            if es.url.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "logging.elasticsearch.url must not be empty".to_string(),
                ));
            }
            if es.flush_bytes == 0 || es.queue_capacity == 0 || es.flush_interval_secs == 0 {
                return Err(ConfigError::Validation(
                    "logging.elasticsearch flush_bytes, flush_interval_secs and queue_capacity \
                     must be positive"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Parse "local", "utc", an IANA zone name or "+HH[:MM]" / "-HH[:MM]".
pub fn parse_timezone(value: &str) -> Result<LogClock, ConfigError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("local") {
        return Ok(LogClock::Local);
    }
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(LogClock::Fixed(Utc.fix()));
    }

    let invalid = || ConfigError::Validation(format!("Invalid timezone: {}", value));

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return trimmed.parse::<Tz>().map(LogClock::Named).map_err(|_| invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "00"));
    let hours = offset_component(hours, 23).ok_or_else(invalid)?;
    let minutes = offset_component(minutes, 59).ok_or_else(invalid)?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .map(LogClock::Fixed)
        .ok_or_else(invalid)
}

/// One or two digits, at most `max`
fn offset_component(digits: &str, max: i32) -> Option<i32> {
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|n| *n <= max)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
