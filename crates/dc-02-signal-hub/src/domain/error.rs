//! Error types for the signal hub.

use shared_bus::BusError;
use shared_types::{BusHandle, TypeError};
use thiserror::Error;

/// Errors returned by subscription operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// The bus has no live connection.
    #[error("{0} bus not available")]
    ConnectionUnavailable(BusHandle),

    /// The bus refused the match rule. Nothing was stored.
    #[error("failed to register filter for {id}: {reason}")]
    FilterRegistration { id: String, reason: String },

    /// No Active subscription with this id.
    #[error("subscription not found: {0}")]
    NotFound(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Too many Active subscriptions.
    #[error("subscription limit reached ({0})")]
    LimitExceeded(usize),

    /// `close_all` has run; no new subscriptions are accepted.
    #[error("signal hub is shutting down")]
    ShuttingDown,
}

impl From<TypeError> for SignalError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidFilter(reason) => SignalError::InvalidFilter(reason),
            TypeError::InvalidBusType(name) => {
                SignalError::InvalidFilter(format!("invalid bus type: {name}"))
            }
        }
    }
}

impl SignalError {
    /// Map a bus failure while acquiring a connection or feed for `bus`.
    pub(crate) fn from_connection(bus: BusHandle, id: &str, e: BusError) -> Self {
        match e {
            BusError::ConnectionUnavailable(bus) => SignalError::ConnectionUnavailable(bus),
            BusError::Closed => SignalError::ConnectionUnavailable(bus),
            other => SignalError::FilterRegistration {
                id: id.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
