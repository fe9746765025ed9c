//! # Shared Types Crate
//!
//! This crate contains the data model shared by the bus pool, the explorer
//! and the signal hub.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Deterministic Identity**: A subscription id is derived from its
//!   filter fields, never from a random token.
//! - **Immutable Events**: A [`RawEvent`] is never mutated after the
//!   connection produced it.

pub mod bus;
pub mod errors;
pub mod filter;
pub mod introspection;
pub mod results;
pub mod subscription;

pub use bus::{BusHandle, BusInfo};
pub use errors::TypeError;
pub use filter::{FilterRule, RawEvent};
pub use introspection::*;
pub use results::{MethodCall, MethodCallResult, PropertyValue, ROOT_PATH};
pub use subscription::{Subscription, SubscriptionId, SubscriptionStatus};
