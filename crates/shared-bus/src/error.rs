//! # Bus Errors
//!
//! Failures surfaced by pooled bus connections.

use shared_types::{BusHandle, TypeError};
use thiserror::Error;

/// Errors from bus connection operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The named bus has no live connection. No retry is attempted.
    #[error("{0} bus not available")]
    ConnectionUnavailable(BusHandle),

    /// The caller named a bus that does not exist.
    #[error("invalid bus type: {0}")]
    InvalidBusType(String),

    /// `AddMatch` / `RemoveMatch` was refused.
    #[error("match rule rejected: {0}")]
    MatchRule(String),

    /// A forwarded call failed on the bus.
    #[error("call to {target} failed: {reason}")]
    CallFailed { target: String, reason: String },

    /// A forwarded call did not answer in time.
    #[error("call to {0} timed out")]
    Timeout(String),

    /// A JSON argument has no bus representation.
    #[error("unsupported argument: {0}")]
    UnsupportedArgument(String),

    /// The connection was torn down.
    #[error("connection closed")]
    Closed,
}

impl BusError {
    pub fn call_failed(target: impl Into<String>, reason: impl ToString) -> Self {
        BusError::CallFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<TypeError> for BusError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidBusType(name) => BusError::InvalidBusType(name),
            TypeError::InvalidFilter(reason) => BusError::MatchRule(reason),
        }
    }
}
