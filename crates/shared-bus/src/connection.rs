//! # Bus Connection Port
//!
//! The capabilities the controller needs from one bus connection. The pool
//! holds one implementation per bus; the signal hub and the explorer only
//! ever see this trait.

use async_trait::async_trait;
use shared_types::{BusHandle, FilterRule, MethodCall, RawEvent};
use tokio::sync::broadcast;

use crate::error::BusError;

/// Receiving end of a connection's shared signal feed.
///
/// Every receiver observes the same ordered sequence of events (fan-out,
/// not partitioned). The channel closes when the connection is torn down.
pub type EventFeed = broadcast::Receiver<RawEvent>;

/// A property value as read from the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProperty {
    /// Type signature of the value.
    pub signature: String,
    pub value: serde_json::Value,
}

/// One live connection to a bus.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// The bus this connection talks to.
    fn bus(&self) -> BusHandle;

    /// Register a server-side signal filter.
    async fn add_match(&self, rule: &FilterRule) -> Result<(), BusError>;

    /// Remove a previously registered filter.
    async fn remove_match(&self, rule: &FilterRule) -> Result<(), BusError>;

    /// Attach a new receiver to the shared signal feed.
    ///
    /// Fails with [`BusError::Closed`] once the connection is torn down.
    fn event_feed(&self) -> Result<EventFeed, BusError>;

    /// Names currently owned on the bus.
    async fn list_names(&self) -> Result<Vec<String>, BusError>;

    /// Unique name owning `name`.
    async fn name_owner(&self, name: &str) -> Result<String, BusError>;

    /// Introspection XML of `path` on `service`.
    async fn introspect(&self, service: &str, path: &str) -> Result<String, BusError>;

    /// Forward a method call and return the reply body.
    async fn call_method(&self, call: &MethodCall) -> Result<Vec<serde_json::Value>, BusError>;

    /// `org.freedesktop.DBus.Properties.Get`.
    async fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<RawProperty, BusError>;

    /// `org.freedesktop.DBus.Properties.Set`.
    async fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: &serde_json::Value,
    ) -> Result<(), BusError>;

    /// Tear the connection down and close the feed. Idempotent.
    async fn close(&self);

    /// Whether `close` has run.
    fn is_closed(&self) -> bool;
}
