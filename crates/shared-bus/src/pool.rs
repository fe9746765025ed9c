//! # Bus Connection Pool
//!
//! At most one shared connection per bus, established at startup and never
//! reconnected. An absent connection is a permanent condition until restart:
//! every operation on that bus fails with
//! [`BusError::ConnectionUnavailable`].
//!
//! The pool's map is immutable after construction, so lookups are lock-free
//! and safe from any number of concurrent tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shared_types::{BusHandle, FilterRule};
use tracing::{info, warn};

use crate::connection::{BusConnection, EventFeed};
use crate::error::BusError;
use crate::DEFAULT_FEED_CAPACITY;

/// Default timeout for forwarded calls, matching the bus daemon's own.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(25_000);

/// Which buses to connect and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub system_bus: bool,
    pub session_bus: bool,
    pub call_timeout: Duration,
    /// Capacity of each connection's shared signal feed.
    pub feed_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            system_bus: true,
            session_bus: true,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Buses enabled by this configuration, in [`BusHandle::ALL`] order.
    #[must_use]
    pub fn enabled_buses(&self) -> Vec<BusHandle> {
        BusHandle::ALL
            .into_iter()
            .filter(|bus| match bus {
                BusHandle::System => self.system_bus,
                BusHandle::Session => self.session_bus,
            })
            .collect()
    }
}

/// Shared connections, one per bus.
pub struct BusConnectionPool {
    connections: HashMap<BusHandle, Arc<dyn BusConnection>>,
    shut_down: AtomicBool,
}

impl BusConnectionPool {
    /// An empty pool. Every bus is unavailable.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Add (or replace) the connection for its bus.
    #[must_use]
    pub fn with_connection(mut self, connection: Arc<dyn BusConnection>) -> Self {
        self.connections.insert(connection.bus(), connection);
        self
    }

    /// Connect every enabled bus. A bus that cannot be reached is logged and
    /// left out; it stays unavailable for the life of the process.
    pub async fn connect(config: &PoolConfig) -> Self {
        let mut pool = Self::new();
        for bus in config.enabled_buses() {
            match Self::open(bus, config).await {
                Ok(connection) => {
                    info!(bus = %bus, "Bus connection established");
                    pool = pool.with_connection(connection);
                }
                Err(e) => {
                    warn!(bus = %bus, error = %e, "Bus connection unavailable");
                }
            }
        }
        pool
    }

    #[cfg(feature = "dbus")]
    async fn open(bus: BusHandle, config: &PoolConfig) -> Result<Arc<dyn BusConnection>, BusError> {
        let connection =
            crate::zbus_conn::ZbusConnection::connect(bus, config.call_timeout, config.feed_capacity)
                .await?;
        Ok(Arc::new(connection))
    }

    #[cfg(not(feature = "dbus"))]
    async fn open(bus: BusHandle, _config: &PoolConfig) -> Result<Arc<dyn BusConnection>, BusError> {
        warn!(bus = %bus, "Built without the `dbus` feature; no bus client available");
        Err(BusError::ConnectionUnavailable(bus))
    }

    /// The live connection for `bus`.
    pub fn connection(&self, bus: BusHandle) -> Result<Arc<dyn BusConnection>, BusError> {
        if self.is_shut_down() {
            return Err(BusError::ConnectionUnavailable(bus));
        }
        self.connections
            .get(&bus)
            .cloned()
            .ok_or(BusError::ConnectionUnavailable(bus))
    }

    /// Register `rule` on its bus.
    pub async fn add_match(&self, rule: &FilterRule) -> Result<(), BusError> {
        self.connection(rule.bus)?.add_match(rule).await
    }

    /// Remove `rule` from its bus.
    pub async fn remove_match(&self, rule: &FilterRule) -> Result<(), BusError> {
        self.connection(rule.bus)?.remove_match(rule).await
    }

    /// A new receiver on `bus`'s shared signal feed.
    pub fn event_feed(&self, bus: BusHandle) -> Result<EventFeed, BusError> {
        self.connection(bus)?.event_feed()
    }

    /// Buses with a live connection, in [`BusHandle::ALL`] order.
    #[must_use]
    pub fn available_buses(&self) -> Vec<BusHandle> {
        if self.is_shut_down() {
            return Vec::new();
        }
        BusHandle::ALL
            .into_iter()
            .filter(|bus| self.connections.contains_key(bus))
            .collect()
    }

    #[must_use]
    pub fn is_available(&self, bus: BusHandle) -> bool {
        !self.is_shut_down() && self.connections.contains_key(&bus)
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Close every connection. Idempotent.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for (bus, connection) in &self.connections {
            connection.close().await;
            info!(bus = %bus, "Bus connection closed");
        }
    }
}

impl Default for BusConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}
