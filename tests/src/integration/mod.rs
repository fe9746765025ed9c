//! Integration flows across the pool, the signal hub, the explorer and the
//! runtime.

pub mod explorer_flows;
pub mod runtime_lifecycle;
pub mod signal_flows;

use std::sync::Arc;

use serde_json::json;
use shared_bus::{BusConnectionPool, InMemoryBusConnection};
use shared_types::{BusHandle, RawEvent};

/// A pool holding one in-memory connection per bus.
pub fn in_memory_pool() -> (
    Arc<BusConnectionPool>,
    Arc<InMemoryBusConnection>,
    Arc<InMemoryBusConnection>,
) {
    let system = Arc::new(InMemoryBusConnection::new(BusHandle::System));
    let session = Arc::new(InMemoryBusConnection::new(BusHandle::Session));
    let pool = BusConnectionPool::new()
        .with_connection(system.clone())
        .with_connection(session.clone());
    (Arc::new(pool), system, session)
}

/// `NameOwnerChanged` as the bus daemon emits it.
pub fn name_owner_changed(name: &str, old_owner: &str, new_owner: &str) -> RawEvent {
    RawEvent::new(
        "org.freedesktop.DBus",
        "org.freedesktop.DBus",
        "NameOwnerChanged",
        "/org/freedesktop/DBus",
        json!([name, old_owner, new_owner]),
    )
}
