//! ZooKeeper backend error types.

use latchkey_core::BackendError;
use thiserror::Error;

/// Result type for ZooKeeper backend setup.
pub type Result<T> = std::result::Result<T, ZooKeeperLockError>;

/// ZooKeeper backend errors.
#[derive(Debug, Error)]
pub enum ZooKeeperLockError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection attempt timed out.
    #[error("Timed out connecting to {0}")]
    Timeout(String),

    /// Underlying ZooKeeper error.
    #[error("ZooKeeper error: {0}")]
    ZooKeeper(#[from] zookeeper_client::Error),
}

impl From<ZooKeeperLockError> for BackendError {
    fn from(err: ZooKeeperLockError) -> Self {
        match err {
            ZooKeeperLockError::Config(msg) => BackendError::InvalidArgument(msg),
            other => BackendError::unavailable("zookeeper", other),
        }
    }
}
