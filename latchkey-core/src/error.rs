//! Error types for lock and backend operations.

use thiserror::Error;

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;

/// Errors reported by a [`LockBackend`](crate::LockBackend).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The coordination service could not be reached or rejected the request.
    #[error("{backend} backend unavailable: {message}")]
    Unavailable {
        /// Backend kind (`redis`, `zookeeper`, ...).
        backend: &'static str,
        /// Underlying failure.
        message: String,
    },

    /// The request can never succeed as issued (bad lock name, zero TTL).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The claim was already gone at release time and the client session
    /// can no longer be trusted.
    #[error("Session no longer owns lock '{name}'")]
    StaleSession {
        /// Lock name.
        name: String,
    },

    /// An owner-checked release found the claim missing or owned by someone else.
    #[error("Claim on lock '{name}' was lost before release")]
    ClaimLost {
        /// Lock name.
        name: String,
    },

    /// The backend has been torn down.
    #[error("Backend closed")]
    Closed,
}

impl BackendError {
    /// Build an [`BackendError::Unavailable`] from any displayable failure.
    pub fn unavailable(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            backend,
            message: err.to_string(),
        }
    }

    /// Check if a caller could reasonably retry at a higher level.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Errors surfaced by the lock handle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// `release` called for a lock the context does not hold.
    #[error("Lock '{name}' is not held by this context")]
    NotHeld {
        /// Lock name.
        name: String,
    },

    /// `release_safely` called for a lock the context does not hold.
    #[error("can not unlock, due to '{context}' doesn't have lock '{name}'")]
    InvalidRelease {
        /// Label of the offending context.
        context: String,
        /// Lock name.
        name: String,
    },

    /// The lock could not be acquired within the wait budget.
    #[error("Failed to acquire lock '{name}'")]
    NotAcquired {
        /// Lock name.
        name: String,
    },

    /// The backend session dropped the claim; the backend has been torn down.
    #[error("Lock '{name}' was released by the coordination service; backend torn down")]
    SessionLost {
        /// Lock name.
        name: String,
    },

    /// Owner-checked release found the claim expired or taken over.
    #[error("Lock '{name}' expired before release")]
    ClaimLost {
        /// Lock name.
        name: String,
    },

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LockError {
    /// Check if this error reports API misuse rather than a backend condition.
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::NotHeld { .. } | Self::InvalidRelease { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_release_message_names_context() {
        let err = LockError::InvalidRelease {
            context: "worker-3".to_string(),
            name: "orders".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "can not unlock, due to 'worker-3' doesn't have lock 'orders'"
        );
        assert!(err.is_misuse());
    }

    #[test]
    fn test_backend_error_conversion() {
        let err: LockError = BackendError::unavailable("redis", "connection refused").into();
        assert_eq!(
            err.to_string(),
            "redis backend unavailable: connection refused"
        );
        assert!(!err.is_misuse());
    }

    #[test]
    fn test_retryable() {
        assert!(BackendError::unavailable("zookeeper", "timeout").is_retryable());
        assert!(!BackendError::Closed.is_retryable());
        assert!(!BackendError::InvalidArgument("empty".into()).is_retryable());
    }
}
