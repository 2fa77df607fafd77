//! ZooKeeper backend configuration.

use latchkey_core::options::millis;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, ZooKeeperLockError};

/// Exponential backoff for retrying deletes after connection loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Base sleep between retries.
    #[serde(with = "millis")]
    pub base_sleep: Duration,
    /// Upper bound for a single sleep.
    #[serde(with = "millis")]
    pub max_sleep: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_sleep: Duration::from_millis(200),
            max_sleep: Duration::from_secs(5),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `attempt` (0-based).
    ///
    /// A random multiple of `base_sleep` in `1..=2^(attempt+1)`, capped at
    /// `max_sleep`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = 1u32 << (attempt.min(29) + 1);
        let factor = rand::rng().random_range(1..=ceiling);
        self.base_sleep.saturating_mul(factor).min(self.max_sleep)
    }
}

/// ZooKeeper backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZooKeeperConfig {
    /// Comma-separated `host:port` list.
    pub connect_string: String,
    /// Session timeout. Ephemeral lock nodes survive disconnects shorter than this.
    #[serde(with = "millis", default = "default_session_timeout")]
    pub session_timeout: Duration,
    /// How long to wait for the initial connection.
    #[serde(with = "millis", default = "default_connection_timeout")]
    pub connection_timeout: Duration,
    /// Parent path of all lock nodes.
    #[serde(default = "default_root")]
    pub root: String,
    /// Retry policy for guaranteed deletes.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_root() -> String {
    "/latchkey".to_string()
}

impl Default for ZooKeeperConfig {
    fn default() -> Self {
        Self {
            connect_string: "localhost:2181".to_string(),
            session_timeout: default_session_timeout(),
            connection_timeout: default_connection_timeout(),
            root: default_root(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ZooKeeperConfig {
    /// Create a new configuration.
    pub fn new(connect_string: impl Into<String>) -> Self {
        Self {
            connect_string: connect_string.into(),
            ..Default::default()
        }
    }

    /// Create a builder.
    pub fn builder() -> ZooKeeperConfigBuilder {
        ZooKeeperConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> ZooKeeperConfigBuilder {
        let mut builder = ZooKeeperConfigBuilder::new();

        if let Ok(connect) = std::env::var("LATCHKEY_ZK_CONNECT") {
            builder = builder.connect_string(connect);
        }

        if let Ok(timeout) = std::env::var("LATCHKEY_ZK_SESSION_TIMEOUT_MS")
            && let Ok(ms) = timeout.parse()
        {
            builder = builder.session_timeout(Duration::from_millis(ms));
        }

        if let Ok(root) = std::env::var("LATCHKEY_ZK_ROOT") {
            builder = builder.root(root);
        }

        builder
    }

    /// Check the root path and connect string.
    pub fn validate(&self) -> Result<()> {
        if self.connect_string.trim().is_empty() {
            return Err(ZooKeeperLockError::Config("empty connect string".into()));
        }
        if !self.root.starts_with('/') || (self.root.len() > 1 && self.root.ends_with('/')) {
            return Err(ZooKeeperLockError::Config(format!(
                "root '{}' must be absolute without a trailing slash",
                self.root
            )));
        }
        if self.root.split('/').skip(1).any(|segment| segment.is_empty()) && self.root != "/" {
            return Err(ZooKeeperLockError::Config(format!(
                "root '{}' contains an empty segment",
                self.root
            )));
        }
        Ok(())
    }

    /// Every ancestor of the root, shallowest first (`/a`, `/a/b`).
    pub(crate) fn root_ancestors(&self) -> Vec<String> {
        let mut path = String::new();
        self.root
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                path.push('/');
                path.push_str(segment);
                path.clone()
            })
            .collect()
    }
}

/// Builder for ZooKeeper configuration.
#[derive(Default)]
pub struct ZooKeeperConfigBuilder {
    config: ZooKeeperConfig,
}

impl ZooKeeperConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: ZooKeeperConfig::default(),
        }
    }

    /// Set the connect string.
    pub fn connect_string(mut self, connect: impl Into<String>) -> Self {
        self.config.connect_string = connect.into();
        self
    }

    /// Set the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set the lock root path.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Set the delete retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ZooKeeperConfig {
        self.config
    }
}
