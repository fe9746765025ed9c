//! # DC-01 Bus Explorer
//!
//! Stateless exploration of the system and session buses: list services,
//! introspect objects, forward method calls, read and write properties.
//!
//! ## Architecture
//!
//! - **Introspection** (`introspection`): pure XML to record translation
//! - **Ports Layer** (`ports/`): `BusExplorerApi` (driving port)
//! - **Service** (`service`): `BusExplorer` over `shared_bus::BusConnectionPool`
//!
//! Bus failures while forwarding a method call are reported inside
//! [`MethodCallResult`](shared_types::MethodCallResult); only a missing
//! connection is an error.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod introspection;
pub mod ports;
pub mod service;

pub use error::ExplorerError;
pub use introspection::parse_introspection;
pub use ports::BusExplorerApi;
pub use service::{BusExplorer, UNKNOWN_OWNER};
