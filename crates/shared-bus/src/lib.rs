//! # Shared Bus - Pooled Bus Connections
//!
//! One shared connection per bus (system, session), each with a single
//! fan-out signal feed that every subscriber reads independently.
//!
//! ```text
//! ┌────────────────┐   add_match / remove_match   ┌──────────────┐
//! │  Signal Hub    │ ───────────────────────────▶ │  Bus daemon  │
//! │  Bus Explorer  │                              └──────┬───────┘
//! └───────┬────────┘                                     │ signals
//!         │ event_feed()                                 ▼
//!         │                                   ┌────────────────────┐
//!         └────────────── broadcast ◀──────── │ BusConnectionPool  │
//!                                             └────────────────────┘
//! ```
//!
//! ## Implementations
//!
//! - [`InMemoryBusConnection`]: in-process bus for tests and client-less builds
//! - `ZbusConnection`: real bus through zbus (feature `dbus`)

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod connection;
pub mod error;
pub mod memory;
pub mod pool;
#[cfg(feature = "dbus")]
pub mod zbus_conn;

pub use connection::{BusConnection, EventFeed, RawProperty};
pub use error::BusError;
pub use memory::{InMemoryBusConnection, InMemoryService, BUS_DAEMON_NAME};
pub use pool::{BusConnectionPool, PoolConfig, DEFAULT_CALL_TIMEOUT};
#[cfg(feature = "dbus")]
pub use zbus_conn::ZbusConnection;

/// Signals buffered per feed receiver before it lags.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;
