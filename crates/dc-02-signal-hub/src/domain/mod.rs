//! Domain layer: configuration, errors and per-subscription state.

pub mod config;
pub mod error;
pub mod state;

pub use config::{
    ConfigError, SignalHubConfig, DEFAULT_MAX_SUBSCRIPTIONS, DEFAULT_QUEUE_CAPACITY, DEFAULT_WAIT,
};
pub use error::SignalError;
pub use state::SubscriptionState;
