//! # Controller Telemetry
//!
//! Structured logging and Prometheus metrics for the dbus controller.
//!
//! ```rust,ignore
//! use dc_telemetry::{init_logging, register_metrics, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! register_metrics()?;
//! ```

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{parse_flag, TelemetryConfig, DEFAULT_LOG_LEVEL};
pub use logging::init_logging;
pub use metrics::{encode_metrics, register_metrics};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid telemetry configuration: {0}")]
    Config(String),

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),
}
