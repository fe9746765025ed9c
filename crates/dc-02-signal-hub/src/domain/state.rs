//! Live state of one subscription.
//!
//! Shared between the registry and the subscription's dispatcher. Status and
//! counters are atomics so neither side needs the registry lock to touch them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use shared_types::{BusHandle, FilterRule, Subscription, SubscriptionId, SubscriptionStatus};

#[derive(Debug)]
pub struct SubscriptionState {
    id: SubscriptionId,
    filter: FilterRule,
    created_at: DateTime<Utc>,
    closed: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
    lagged: AtomicU64,
}

impl SubscriptionState {
    #[must_use]
    pub fn new(filter: FilterRule) -> Self {
        Self {
            id: filter.subscription_id(),
            filter,
            created_at: Utc::now(),
            closed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            lagged: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bus(&self) -> BusHandle {
        self.filter.bus
    }

    pub fn filter(&self) -> &FilterRule {
        &self.filter
    }

    pub fn status(&self) -> SubscriptionStatus {
        if self.closed.load(Ordering::Acquire) {
            SubscriptionStatus::Closed
        } else {
            SubscriptionStatus::Active
        }
    }

    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Move to Closed. Returns `true` only for the caller that made the
    /// transition.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lagged(&self, skipped: u64) {
        self.lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Feed events this subscription never saw because it fell behind.
    pub fn lagged(&self) -> u64 {
        self.lagged.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> Subscription {
        Subscription {
            id: self.id.clone(),
            bus: self.filter.bus,
            filter: self.filter.clone(),
            status: self.status(),
            created_at: self.created_at,
            delivered: self.delivered(),
            dropped: self.dropped(),
        }
    }
}
