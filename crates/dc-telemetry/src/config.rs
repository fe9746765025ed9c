//! Telemetry configuration from environment variables.

use std::env;

/// Default `EnvFilter` directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for logging output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "dbus-controller".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DC_SERVICE_NAME`: Service name (default: dbus-controller)
    /// - `DC_LOG_LEVEL`: Log level (default: info); `RUST_LOG` takes precedence at init
    /// - `DC_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `DC_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("DC_SERVICE_NAME")
                .unwrap_or_else(|_| "dbus-controller".to_string()),

            log_level: env::var("DC_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),

            console_output: env::var("DC_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v).unwrap_or(true))
                .unwrap_or(true),

            json_logs: env::var("DC_JSON_LOGS")
                .map(|v| parse_flag(&v).unwrap_or(false))
                .unwrap_or(is_container),
        }
    }
}

/// Parse a boolean environment flag (`true`/`false`/`1`/`0`/`yes`/`no`).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
