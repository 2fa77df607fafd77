//! Errors raised while selecting and connecting a backend.

use thiserror::Error;

/// Result type for backend setup.
pub type ConnectResult<T> = std::result::Result<T, ConnectError>;

/// Backend setup errors.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Invalid or unsupported backend configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be parsed.
    #[error("Invalid backend configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Redis backend failed to connect.
    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] latchkey_redis::RedisLockError),

    /// ZooKeeper backend failed to connect.
    #[cfg(feature = "zookeeper")]
    #[error(transparent)]
    ZooKeeper(#[from] latchkey_zookeeper::ZooKeeperLockError),
}
