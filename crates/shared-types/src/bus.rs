//! # Bus Identity
//!
//! A process talks to at most two logical buses: the system-wide bus and the
//! per-login session bus. Each maps to exactly one pooled connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TypeError;

/// Identifies a logical bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusHandle {
    /// The system-wide bus.
    System,
    /// The per-login session bus.
    Session,
}

impl BusHandle {
    /// Every bus the controller knows about, in listing order.
    pub const ALL: [BusHandle; 2] = [BusHandle::System, BusHandle::Session];

    /// Lowercase name used in ids, logs and the external API.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BusHandle::System => "system",
            BusHandle::Session => "session",
        }
    }

    /// Human readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            BusHandle::System => "System D-Bus",
            BusHandle::Session => "Session D-Bus",
        }
    }
}

impl fmt::Display for BusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusHandle {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(BusHandle::System),
            "session" => Ok(BusHandle::Session),
            other => Err(TypeError::InvalidBusType(other.to_string())),
        }
    }
}

/// Describes a bus for listing purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusInfo {
    #[serde(rename = "type")]
    pub bus_type: String,
    pub description: String,
}

impl From<BusHandle> for BusInfo {
    fn from(bus: BusHandle) -> Self {
        Self {
            bus_type: bus.as_str().to_string(),
            description: bus.description().to_string(),
        }
    }
}
