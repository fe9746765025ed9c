//! # Error Types
//!
//! Validation errors raised while building shared types from caller input.

use thiserror::Error;

/// Errors raised when caller input cannot be turned into a bus type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The bus name is neither `system` nor `session`.
    #[error("invalid bus type: {0}")]
    InvalidBusType(String),

    /// A filter rule is missing a mandatory field.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}
