//! # Filter Rules and Raw Events
//!
//! A [`FilterRule`] describes which broadcast signals a subscriber wants.
//! A [`RawEvent`] is one broadcast signal as delivered by a bus connection.
//!
//! ## Matching
//!
//! ```text
//! matches(E, F) = E.interface == F.interface
//!              && E.member == F.member
//!              && (F.sender == "" || E.sender == F.sender)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bus::BusHandle;
use crate::errors::TypeError;
use crate::subscription::SubscriptionId;

/// Selects broadcast signals on one bus.
///
/// `interface` and `member` are always present. An empty `sender` means
/// "any sender".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterRule {
    pub bus: BusHandle,
    #[serde(default)]
    pub sender: String,
    pub interface: String,
    pub member: String,
}

impl FilterRule {
    /// Build a validated rule.
    pub fn new(
        bus: BusHandle,
        sender: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let rule = Self {
            bus,
            sender: sender.into(),
            interface: interface.into(),
            member: member.into(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Check the mandatory fields.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.interface.trim().is_empty() {
            return Err(TypeError::InvalidFilter("interface name is required".into()));
        }
        if self.member.trim().is_empty() {
            return Err(TypeError::InvalidFilter("member name is required".into()));
        }
        // Quotes would break out of the rule string sent to the bus daemon.
        let fields = [&self.sender, &self.interface, &self.member];
        if fields.iter().any(|f| f.contains('\'')) {
            return Err(TypeError::InvalidFilter(
                "filter fields must not contain quotes".into(),
            ));
        }
        Ok(())
    }

    /// Whether the rule constrains the sender.
    #[must_use]
    pub fn has_sender(&self) -> bool {
        !self.sender.is_empty()
    }

    /// Test an event against this rule.
    #[must_use]
    pub fn matches(&self, event: &RawEvent) -> bool {
        event.interface == self.interface
            && event.member == self.member
            && (self.sender.is_empty() || event.sender == self.sender)
    }

    /// Deterministic subscription id: `bus:sender:interface:member`.
    #[must_use]
    pub fn subscription_id(&self) -> SubscriptionId {
        format!(
            "{}:{}:{}:{}",
            self.bus, self.sender, self.interface, self.member
        )
    }

    /// Server-side match rule string for `AddMatch` / `RemoveMatch`.
    #[must_use]
    pub fn match_rule(&self) -> String {
        let mut rule = format!(
            "type='signal',interface='{}',member='{}'",
            self.interface, self.member
        );
        if self.has_sender() {
            rule.push_str(&format!(",sender='{}'", self.sender));
        }
        rule
    }
}

/// One broadcast signal as received from a bus connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub sender: String,
    pub interface: String,
    pub member: String,
    pub path: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl RawEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        sender: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
        path: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            sender: sender.into(),
            interface: interface.into(),
            member: member.into(),
            path: path.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}
