//! Redis backend error types.

use latchkey_core::BackendError;
use thiserror::Error;

/// Result type for Redis backend setup.
pub type Result<T> = std::result::Result<T, RedisLockError>;

/// Redis backend errors.
#[derive(Debug, Error)]
pub enum RedisLockError {
    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection attempt timed out.
    #[error("Connection timed out")]
    Timeout,

    /// Underlying Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl RedisLockError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Redis(e) => e.is_connection_dropped() || e.is_timeout(),
            Self::Config(_) => false,
        }
    }
}

impl From<RedisLockError> for BackendError {
    fn from(err: RedisLockError) -> Self {
        match err {
            RedisLockError::Config(msg) => BackendError::InvalidArgument(msg),
            other => BackendError::unavailable("redis", other),
        }
    }
}
