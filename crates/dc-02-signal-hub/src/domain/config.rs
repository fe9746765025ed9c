//! Signal hub configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of each subscription's delivery queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default upper bound on Active subscriptions.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 1024;

/// Default wait for a blocking read.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Signal hub configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalHubConfig {
    /// Capacity of each delivery queue. Matching events beyond it are dropped.
    pub queue_capacity: usize,
    /// Maximum number of Active subscriptions.
    pub max_subscriptions: usize,
    /// Wait used by `next_event` when the caller passes none.
    #[serde(with = "humantime_serde")]
    pub default_wait: Duration,
    /// Issue `RemoveMatch` for every entry during `close_all`.
    pub remove_match_on_close_all: bool,
}

impl Default for SignalHubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            default_wait: DEFAULT_WAIT,
            remove_match_on_close_all: true,
        }
    }
}

impl SignalHubConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "queue_capacity cannot be 0".into(),
            ));
        }

        if self.max_subscriptions == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_subscriptions cannot be 0".into(),
            ));
        }

        if self.default_wait.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "default_wait cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s": every millisecond value also ends in 's'.
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
