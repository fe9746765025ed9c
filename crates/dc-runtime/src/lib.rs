//! # Controller Runtime
//!
//! Wires the bus connection pool, the bus explorer and the signal hub into a
//! single process. The `dbus-controller` binary is a thin shell over
//! [`ControllerRuntime`].
//!
//! ## Startup
//!
//! 1. Validate configuration
//! 2. Connect every enabled bus (unreachable buses stay unavailable)
//! 3. Build the subscription registry and the explorer over the shared pool
//!
//! ## Shutdown
//!
//! 1. Close every subscription (`close_all`)
//! 2. Close the bus connections

pub mod adapters;
pub mod config;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dc_01_bus_explorer::{BusExplorer, BusExplorerApi};
use dc_02_signal_hub::{SignalSubscriptionApi, SubscriptionRegistry};
use dc_telemetry::metrics::BUS_CONNECTIONS_AVAILABLE;
use shared_bus::BusConnectionPool;
use shared_types::BusHandle;
use tracing::{info, warn};

pub use adapters::PrometheusSignalMetrics;
pub use config::{ConfigError, RuntimeConfig};

/// The running controller.
pub struct ControllerRuntime {
    config: RuntimeConfig,
    pool: Arc<BusConnectionPool>,
    registry: Arc<SubscriptionRegistry>,
    explorer: Arc<BusExplorer>,
    shut_down: AtomicBool,
}

impl ControllerRuntime {
    /// Validate `config`, connect the enabled buses and build the subsystems.
    pub async fn start(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!("===========================================");
        info!("  dbus-controller v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let pool = Arc::new(BusConnectionPool::connect(&config.pool).await);
        Ok(Self::with_pool(config, pool))
    }

    /// Build the subsystems over an existing pool.
    pub fn with_pool(config: RuntimeConfig, pool: Arc<BusConnectionPool>) -> Self {
        let available = pool.available_buses();
        if available.is_empty() {
            warn!("No bus connection available; every request will fail until restart");
        }
        for bus in BusHandle::ALL {
            BUS_CONNECTIONS_AVAILABLE
                .with_label_values(&[bus.as_str()])
                .set(i64::from(available.contains(&bus)));
        }

        let registry = Arc::new(SubscriptionRegistry::with_metrics(
            Arc::clone(&pool),
            config.signal_hub.clone(),
            Arc::new(PrometheusSignalMetrics),
        ));
        let explorer = Arc::new(BusExplorer::new(Arc::clone(&pool)));

        info!(
            buses = ?available,
            queue_capacity = config.signal_hub.queue_capacity,
            max_subscriptions = config.signal_hub.max_subscriptions,
            "Controller runtime ready"
        );

        Self {
            config,
            pool,
            registry,
            explorer,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn pool(&self) -> Arc<BusConnectionPool> {
        Arc::clone(&self.pool)
    }

    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    /// The signal subscription port.
    pub fn signals(&self) -> Arc<dyn SignalSubscriptionApi> {
        self.registry.clone()
    }

    /// The bus exploration port.
    pub fn explorer(&self) -> Arc<dyn BusExplorerApi> {
        self.explorer.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Close every subscription, then every connection. Idempotent.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Initiating graceful shutdown...");

        self.registry.close_all().await;
        self.pool.shutdown().await;

        for bus in BusHandle::ALL {
            BUS_CONNECTIONS_AVAILABLE
                .with_label_values(&[bus.as_str()])
                .set(0);
        }
        info!("Shutdown complete");
    }
}
