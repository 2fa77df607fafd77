//! In-process lock backend.
//!
//! Useful for tests and single-node deployments. Claims are only exclusive
//! within the process that owns the backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::backend::{ClaimOutcome, LockBackend};
use crate::context::ContextId;
use crate::error::BackendError;

#[derive(Debug, Clone, Copy)]
struct Claim {
    owner: ContextId,
    expires_at: Option<Instant>,
}

/// Claim counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Successful claims.
    pub granted: u64,
    /// Claim attempts that found the name taken.
    pub contended: u64,
    /// Unclaim calls.
    pub released: u64,
}

/// Lock backend holding claims in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    claims: Mutex<HashMap<String, Claim>>,
    expire_leases: bool,
    closed: AtomicBool,
    granted: AtomicU64,
    contended: AtomicU64,
    released: AtomicU64,
}

impl MemoryBackend {
    /// Create a backend whose claims live until released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose claims expire after their lease, like a
    /// key-value store with TTLs.
    pub fn with_lease_expiry() -> Self {
        Self {
            expire_leases: true,
            ..Default::default()
        }
    }

    /// Check if `name` is currently claimed.
    pub fn is_claimed(&self, name: &str) -> bool {
        let mut claims = self.claims.lock();
        purge_expired(&mut claims, Instant::now());
        claims.contains_key(name)
    }

    /// Context currently holding the claim on `name`.
    pub fn holder(&self, name: &str) -> Option<ContextId> {
        let mut claims = self.claims.lock();
        purge_expired(&mut claims, Instant::now());
        claims.get(name).map(|claim| claim.owner)
    }

    /// Drop the claim on `name` as if it had expired.
    pub fn expire(&self, name: &str) -> bool {
        self.claims.lock().remove(name).is_some()
    }

    /// Get claim counters.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            granted: self.granted.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BackendError::Closed)
        } else {
            Ok(())
        }
    }
}

fn purge_expired(claims: &mut HashMap<String, Claim>, now: Instant) {
    claims.retain(|_, claim| claim.expires_at.is_none_or(|at| at > now));
}

#[async_trait]
impl LockBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn claim(&self, name: &str, owner: ContextId, lease: Duration) -> Result<ClaimOutcome, BackendError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut claims = self.claims.lock();
        purge_expired(&mut claims, now);

        if claims.contains_key(name) {
            self.contended.fetch_add(1, Ordering::Relaxed);
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let expires_at = if self.expire_leases {
            if lease.is_zero() {
                return Err(BackendError::InvalidArgument(
                    "claim lease must be non-zero".to_string(),
                ));
            }
            Some(now + lease)
        } else {
            None
        };
        claims.insert(name.to_string(), Claim { owner, expires_at });
        self.granted.fetch_add(1, Ordering::Relaxed);
        debug!(lock = %name, owner = %owner, "Memory claim granted");
        Ok(ClaimOutcome::Claimed)
    }

    /// Removes the claim whoever holds it, like an unconditional `DEL`.
    async fn unclaim(&self, name: &str, owner: ContextId) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.released.fetch_add(1, Ordering::Relaxed);
        match self.claims.lock().remove(name) {
            None => debug!(lock = %name, "Memory claim already gone"),
            Some(claim) if claim.owner != owner => {
                debug!(lock = %name, owner = %owner, holder = %claim.owner, "Removed claim of another context")
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Memory lock backend closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LockContext;

    fn owner() -> ContextId {
        LockContext::named("test").id()
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let backend = MemoryBackend::new();
        let (first, second) = (owner(), owner());
        assert_eq!(
            backend.claim("a", first, Duration::from_secs(1)).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            backend.claim("a", second, Duration::from_secs(1)).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(backend.holder("a"), Some(first));
        assert_eq!(
            backend.claim("b", second, Duration::from_secs(1)).await.unwrap(),
            ClaimOutcome::Claimed
        );

        backend.unclaim("a", first).await.unwrap();
        assert!(!backend.is_claimed("a"));
        assert_eq!(backend.holder("a"), None);
        assert_eq!(
            backend.stats(),
            MemoryStats {
                granted: 2,
                contended: 1,
                released: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry() {
        let backend = MemoryBackend::with_lease_expiry();
        assert!(
            backend
                .claim("a", owner(), Duration::from_millis(100))
                .await
                .unwrap()
                .is_claimed()
        );

        tokio::time::advance(Duration::from_millis(150)).await;

        assert!(!backend.is_claimed("a"));
        assert!(
            backend
                .claim("a", owner(), Duration::from_millis(100))
                .await
                .unwrap()
                .is_claimed()
        );
    }

    #[tokio::test]
    async fn test_zero_lease_rejected_when_expiring() {
        let backend = MemoryBackend::with_lease_expiry();
        let err = backend.claim("a", owner(), Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_expire_frees_name() {
        let backend = MemoryBackend::new();
        backend.claim("a", owner(), Duration::from_secs(1)).await.unwrap();

        assert!(backend.expire("a"));
        assert!(!backend.expire("a"));
        assert!(!backend.is_claimed("a"));
    }

    #[tokio::test]
    async fn test_closed_backend_fails_fast() {
        let backend = MemoryBackend::new();
        backend.teardown().await.unwrap();
        backend.teardown().await.unwrap();

        assert_eq!(
            backend.claim("a", owner(), Duration::from_secs(1)).await.unwrap_err(),
            BackendError::Closed
        );
    }
}
