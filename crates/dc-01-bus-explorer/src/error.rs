//! Error types for the bus explorer.

use shared_bus::BusError;
use thiserror::Error;

/// Errors that can occur while exploring a bus
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("failed to parse introspection XML: {0}")]
    Introspection(String),

    #[error("interface {0} not found")]
    InterfaceNotFound(String),

    #[error("invalid bus type: {0}")]
    InvalidBusType(String),
}
