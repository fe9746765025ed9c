//! # DC-02 Signal Hub
//!
//! Signal subscriptions for the controller: callers register a filter on a
//! bus, and every matching broadcast signal is queued for them until drained.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): configuration, errors, per-subscription state
//! - **Ports Layer** (`ports/`): `SignalSubscriptionApi` (driving port)
//! - **Registry** (`registry`): id to subscription map, subscribe/unsubscribe/close_all
//! - **Dispatcher** (`dispatcher`): one task per subscription reading the shared feed
//! - **Queue** (`queue`): bounded per-subscription FIFO, drop-on-full
//!
//! ```text
//! subscribe ──▶ Registry ──add_match──▶ BusConnectionPool
//!                  │                          │ shared feed (broadcast)
//!                  │ spawn                    ▼
//!                  └────────────▶ Dispatcher ──try_push──▶ DeliveryQueue ──▶ poll / next_event
//! ```
//!
//! ## Invariants
//!
//! - At most one Active subscription per id.
//! - Every Active subscription has exactly one running dispatcher.
//! - Closed is terminal; nothing is queued after a subscription closes.
//! - A full queue drops the incoming event and counts exactly one drop.
//!
//! ## Usage Example
//!
//! ```ignore
//! use dc_02_signal_hub::{SignalHubConfig, SubscriptionRegistry};
//! use shared_types::BusHandle;
//!
//! let registry = SubscriptionRegistry::new(pool, SignalHubConfig::default());
//! let sub = registry
//!     .subscribe(BusHandle::System, "", "org.freedesktop.DBus", "NameOwnerChanged")
//!     .await?;
//! while let Some(event) = registry.next_event(&sub.id, None).await? {
//!     println!("{} {}", event.sender, event.member);
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dispatcher;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod queue;
pub mod registry;

// Re-exports for convenience
pub use dispatcher::{DispatchExit, EventDispatcher};
pub use domain::{ConfigError, SignalError, SignalHubConfig, SubscriptionState};
pub use metrics::{NoOpMetrics, SignalMetrics};
pub use ports::SignalSubscriptionApi;
pub use queue::{delivery_queue, PushOutcome, QueueReader, QueueWriter};
pub use registry::SubscriptionRegistry;
