//! # dbus-controller
//!
//! Exposes the system and session message buses to request/response
//! clients: introspection, method calls, properties and signal
//! subscriptions.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics
//! 2. Load configuration from `DC_*` environment variables
//! 3. Connect the enabled buses and build the subsystems
//! 4. Run until Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use tracing::info;

use dc_runtime::{ControllerRuntime, RuntimeConfig};
use dc_telemetry::{init_logging, register_metrics, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let telemetry = TelemetryConfig::from_env();
    init_logging(&telemetry).context("Failed to initialize logging")?;
    register_metrics().context("Failed to register metrics")?;

    // Load configuration
    let config = RuntimeConfig::from_env();

    // Connect and wire the subsystems
    let runtime = ControllerRuntime::start(config)
        .await
        .context("Invalid configuration")?;

    info!("Controller is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    // Graceful shutdown
    runtime.shutdown().await;

    Ok(())
}
