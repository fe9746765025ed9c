//! # Subscription Records
//!
//! Serializable snapshots of signal subscriptions. The live state is owned
//! by the signal hub; these records are what callers see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bus::BusHandle;
use crate::filter::FilterRule;

/// Subscription identifier, derived from the filter fields.
pub type SubscriptionId = String;

/// Lifecycle state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Closed,
}

impl SubscriptionStatus {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

/// Point-in-time view of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub bus: BusHandle,
    pub filter: FilterRule,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    /// Events pushed into the delivery queue so far.
    pub delivered: u64,
    /// Matching events discarded because the delivery queue was full.
    pub dropped: u64,
}

impl Subscription {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
