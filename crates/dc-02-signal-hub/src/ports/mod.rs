//! Ports layer: the API the signal hub offers to its callers.

pub mod inbound;

pub use inbound::SignalSubscriptionApi;
