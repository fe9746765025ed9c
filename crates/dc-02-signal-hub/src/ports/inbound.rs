//! Inbound Ports (Driving Ports)
//!
//! The operations a request gateway uses to manage signal subscriptions and
//! drain their delivery queues.

use std::time::Duration;

use async_trait::async_trait;
use shared_types::{BusHandle, RawEvent, Subscription};

use crate::domain::SignalError;

/// Signal subscription API (Driving Port)
#[async_trait]
pub trait SignalSubscriptionApi: Send + Sync {
    /// Register a filter on `bus` and start delivering matching signals.
    ///
    /// An empty `sender` matches any sender. Identical parameters return the
    /// existing Active subscription.
    async fn subscribe(
        &self,
        bus: BusHandle,
        sender: &str,
        interface: &str,
        member: &str,
    ) -> Result<Subscription, SignalError>;

    /// Close an Active subscription and return its final snapshot.
    async fn unsubscribe(&self, id: &str) -> Result<Subscription, SignalError>;

    fn get(&self, id: &str) -> Option<Subscription>;

    fn list(&self) -> Vec<Subscription>;

    /// Take up to `max` queued events without waiting.
    ///
    /// Empty while a `next_event` wait on the same id is pending.
    fn poll(&self, id: &str, max: usize) -> Result<Vec<RawEvent>, SignalError>;

    /// Wait for the next queued event.
    ///
    /// `wait` of `None` uses the configured default. Returns `Ok(None)` on
    /// timeout or when the queue is closed and empty.
    async fn next_event(
        &self,
        id: &str,
        wait: Option<Duration>,
    ) -> Result<Option<RawEvent>, SignalError>;
}
