//! Backend capability consumed by the lock core.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::context::ContextId;
use crate::error::BackendError;

/// Outcome of a single claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This process now holds the claim.
    Claimed,
    /// Someone else holds the claim; retry later.
    AlreadyClaimed,
}

impl ClaimOutcome {
    /// Check if the claim was granted.
    pub fn is_claimed(self) -> bool {
        matches!(self, Self::Claimed)
    }
}

/// Atomic claim/release primitive supplied by a coordination service.
///
/// Implementations must make `claim` atomic on the service side: of any
/// number of concurrent callers for the same name, at most one observes
/// [`ClaimOutcome::Claimed`] until the claim is released or expires. The
/// lock core never reads backend state before writing it.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Short backend identifier used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Attempt to claim `name` on behalf of `owner`.
    ///
    /// `lease` is the caller's wait budget. Backends with expiring claims may
    /// use it as the claim TTL; session-bound backends ignore it.
    async fn claim(&self, name: &str, owner: ContextId, lease: Duration) -> Result<ClaimOutcome, BackendError>;

    /// Release a claim previously obtained by [`claim`](Self::claim) with the
    /// same `owner`.
    async fn unclaim(&self, name: &str, owner: ContextId) -> Result<(), BackendError>;

    /// Release client resources. Must be idempotent.
    ///
    /// Open claims are not released explicitly; they disappear through TTL
    /// expiry or session termination.
    async fn teardown(&self) -> Result<(), BackendError>;
}

#[async_trait]
impl<B: LockBackend + ?Sized> LockBackend for Arc<B> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    async fn claim(&self, name: &str, owner: ContextId, lease: Duration) -> Result<ClaimOutcome, BackendError> {
        (**self).claim(name, owner, lease).await
    }

    async fn unclaim(&self, name: &str, owner: ContextId) -> Result<(), BackendError> {
        (**self).unclaim(name, owner).await
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        (**self).teardown().await
    }
}

#[async_trait]
impl<B: LockBackend + ?Sized> LockBackend for Box<B> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    async fn claim(&self, name: &str, owner: ContextId, lease: Duration) -> Result<ClaimOutcome, BackendError> {
        (**self).claim(name, owner, lease).await
    }

    async fn unclaim(&self, name: &str, owner: ContextId) -> Result<(), BackendError> {
        (**self).unclaim(name, owner).await
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        (**self).teardown().await
    }
}
