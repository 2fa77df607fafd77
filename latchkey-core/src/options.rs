//! Acquisition options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between failed claim attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Default wait budget.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);

/// Wait budget and polling cadence for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireOptions {
    /// How long to keep retrying. Also the claim TTL for expiring backends.
    #[serde(with = "millis", default = "default_max_wait")]
    pub max_wait: Duration,
    /// Sleep between failed claim attempts.
    #[serde(with = "millis", default = "default_retry_interval")]
    pub retry_interval: Duration,
}

fn default_max_wait() -> Duration {
    DEFAULT_MAX_WAIT
}

fn default_retry_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl AcquireOptions {
    /// Create options with the given wait budget and the default interval.
    pub fn new(max_wait: Duration) -> Self {
        Self {
            max_wait,
            ..Default::default()
        }
    }

    /// Set the wait budget.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the retry interval.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// Serialize durations as integer milliseconds.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = AcquireOptions::default();
        assert_eq!(opts.retry_interval, Duration::from_millis(50));
        assert_eq!(opts.max_wait, Duration::from_secs(30));
    }

    #[test]
    fn test_builder() {
        let opts = AcquireOptions::new(Duration::from_millis(200))
            .retry_interval(Duration::from_millis(10));
        assert_eq!(opts.max_wait, Duration::from_millis(200));
        assert_eq!(opts.retry_interval, Duration::from_millis(10));
    }
}
