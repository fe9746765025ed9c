//! # Runtime Configuration
//!
//! Unified configuration for the pool, the signal hub and telemetry, read from
//! `DC_*` environment variables.
//!
//! A value that does not parse is logged and the default kept.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dc_02_signal_hub::SignalHubConfig;
use dc_telemetry::{parse_flag, TelemetryConfig};
use shared_bus::PoolConfig;
use thiserror::Error;
use tracing::warn;

/// Complete controller configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Bus connection pool.
    pub pool: PoolConfig,
    /// Signal subscriptions.
    pub signal_hub: SignalHubConfig,
    /// Logging.
    pub telemetry: TelemetryConfig,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no bus enabled; set DC_SYSTEM_BUS or DC_SESSION_BUS")]
    NoBusEnabled,

    #[error("invalid pool configuration: {0}")]
    Pool(String),

    #[error(transparent)]
    SignalHub(#[from] dc_02_signal_hub::ConfigError),

    #[error("invalid telemetry configuration: {0}")]
    Telemetry(String),
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|key| env::var(key).ok());
        config.telemetry = TelemetryConfig::from_env();
        config
    }

    /// Load through `lookup`, starting from the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(enabled) = read_flag(&lookup, "DC_SYSTEM_BUS") {
            config.pool.system_bus = enabled;
        }
        if let Some(enabled) = read_flag(&lookup, "DC_SESSION_BUS") {
            config.pool.session_bus = enabled;
        }
        if let Some(ms) = read_parsed::<u64, _>(&lookup, "DC_CALL_TIMEOUT_MS") {
            config.pool.call_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = read_parsed(&lookup, "DC_FEED_CAPACITY") {
            config.pool.feed_capacity = capacity;
        }

        if let Some(capacity) = read_parsed(&lookup, "DC_QUEUE_CAPACITY") {
            config.signal_hub.queue_capacity = capacity;
        }
        if let Some(max) = read_parsed(&lookup, "DC_MAX_SUBSCRIPTIONS") {
            config.signal_hub.max_subscriptions = max;
        }
        if let Some(ms) = read_parsed::<u64, _>(&lookup, "DC_DEFAULT_WAIT_MS") {
            config.signal_hub.default_wait = Duration::from_millis(ms);
        }
        if let Some(remove) = read_flag(&lookup, "DC_REMOVE_MATCH_ON_SHUTDOWN") {
            config.signal_hub.remove_match_on_close_all = remove;
        }

        if let Some(level) = lookup("DC_LOG_LEVEL") {
            config.telemetry.log_level = level;
        }
        if let Some(json) = read_flag(&lookup, "DC_JSON_LOGS") {
            config.telemetry.json_logs = json;
        }

        config
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.enabled_buses().is_empty() {
            return Err(ConfigError::NoBusEnabled);
        }
        if self.pool.call_timeout.is_zero() {
            return Err(ConfigError::Pool("call_timeout cannot be 0".into()));
        }
        if self.pool.feed_capacity == 0 {
            return Err(ConfigError::Pool("feed_capacity cannot be 0".into()));
        }

        self.signal_hub.validate()?;

        if self.telemetry.log_level.trim().is_empty() {
            return Err(ConfigError::Telemetry("log_level cannot be empty".into()));
        }
        Ok(())
    }
}

fn read_parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}

fn read_flag<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let flag = parse_flag(&raw);
    if flag.is_none() {
        warn!(key, value = %raw, "Ignoring unparseable configuration flag");
    }
    flag
}
