//! # Call and Property Results
//!
//! Request and result shapes for forwarded method calls and property
//! access. Values travel as JSON; the bus connection converts them to and
//! from the bus's typed variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object path used when the caller does not name one.
pub const ROOT_PATH: &str = "/";

/// A method invocation to forward to a bus service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub destination: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl MethodCall {
    /// Call `interface.member` on the root object of `destination`.
    pub fn new(
        destination: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            destination: destination.into(),
            path: ROOT_PATH.to_string(),
            interface: interface.into(),
            member: member.into(),
            args,
        }
    }

    /// Target the call at another object path.
    #[must_use]
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// `destination path interface.member`, for logs and errors.
    #[must_use]
    pub fn target(&self) -> String {
        format!(
            "{} {} {}.{}",
            self.destination, self.path, self.interface, self.member
        )
    }
}

/// Outcome of a forwarded method call.
///
/// A failed remote call is a normal result with `success == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCallResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub return_values: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl MethodCallResult {
    #[must_use]
    pub fn ok(return_values: Vec<serde_json::Value>) -> Self {
        Self {
            success: true,
            return_values,
            error: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            return_values: Vec::new(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Current value of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub name: String,
    /// Type signature of the value.
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
