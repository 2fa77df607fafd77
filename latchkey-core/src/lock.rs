//! Reentrant lock handle over a [`LockBackend`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backend::{ClaimOutcome, LockBackend};
use crate::context::LockContext;
use crate::error::{BackendError, LockError, Result};
use crate::options::{AcquireOptions, DEFAULT_RETRY_INTERVAL};

/// Process-local, reentrant handle to locks whose ownership lives in a
/// coordination service.
///
/// Acquisition is a spin-poll: no ordering among waiters is guaranteed and a
/// busy lock may starve a waiter until its wait budget runs out.
///
/// # Examples
///
/// ```rust,ignore
/// use latchkey_core::{LockContext, MemoryBackend, ReentrantLock};
/// use std::time::Duration;
///
/// let lock = ReentrantLock::new(MemoryBackend::new());
/// let mut ctx = LockContext::new();
///
/// if lock.acquire(&mut ctx, "reports", Duration::from_secs(5)).await {
///     // critical section
///     lock.release(&mut ctx, "reports").await?;
/// }
/// ```
pub struct ReentrantLock<B: LockBackend> {
    backend: B,
    retry_interval: Duration,
}

impl<B: LockBackend> ReentrantLock<B> {
    /// Create a lock handle using the default 50ms retry interval.
    pub fn new(backend: B) -> Self {
        Self::with_retry_interval(backend, DEFAULT_RETRY_INTERVAL)
    }

    /// Create a lock handle with a custom default retry interval.
    pub fn with_retry_interval(backend: B, retry_interval: Duration) -> Self {
        Self {
            backend,
            retry_interval,
        }
    }

    /// Get the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Acquire `name`, waiting at most `max_wait`.
    pub async fn acquire(&self, ctx: &mut LockContext, name: &str, max_wait: Duration) -> bool {
        self.acquire_with_retry(ctx, name, max_wait, self.retry_interval)
            .await
    }

    /// Acquire `name` using the given options.
    pub async fn acquire_with(
        &self,
        ctx: &mut LockContext,
        name: &str,
        options: &AcquireOptions,
    ) -> bool {
        self.acquire_with_retry(ctx, name, options.max_wait, options.retry_interval)
            .await
    }

    /// Acquire `name`, sleeping `retry_interval` between failed attempts.
    ///
    /// Returns `true` if the context now holds the lock, either through a new
    /// backend claim or reentrantly. Returns `false` once `max_wait` has
    /// elapsed or the backend fails with anything other than contention; no
    /// claim is left behind in either case.
    pub async fn acquire_with_retry(
        &self,
        ctx: &mut LockContext,
        name: &str,
        max_wait: Duration,
        retry_interval: Duration,
    ) -> bool {
        if name.is_empty() {
            warn!(context = %ctx.label(), "Refusing to acquire a lock with an empty name");
            return false;
        }

        if let Some(count) = ctx.reenter(name) {
            debug!(lock = %name, context = %ctx.label(), count, "Reentered lock");
            return true;
        }

        let start = Instant::now();
        loop {
            match self.backend.claim(name, ctx.id(), max_wait).await {
                Ok(ClaimOutcome::Claimed) => {
                    ctx.record_claim(name);
                    debug!(lock = %name, context = %ctx.label(), "Acquired lock");
                    return true;
                }
                Ok(ClaimOutcome::AlreadyClaimed) => {
                    debug!(lock = %name, context = %ctx.label(), "Lock held elsewhere, waiting");
                }
                Err(e) => {
                    error!(
                        lock = %name,
                        context = %ctx.label(),
                        backend = self.backend.kind(),
                        error = %e,
                        "Aborting lock acquisition"
                    );
                    return false;
                }
            }

            tokio::time::sleep(retry_interval).await;

            if start.elapsed() >= max_wait {
                debug!(
                    lock = %name,
                    context = %ctx.label(),
                    waited_ms = start.elapsed().as_millis() as u64,
                    "Timed out waiting for lock"
                );
                return false;
            }
        }
    }

    /// Release one hold of `name`.
    ///
    /// The backend claim is only destroyed when the last hold is released.
    /// Releasing a lock the context does not hold is an error.
    pub async fn release(&self, ctx: &mut LockContext, name: &str) -> Result<()> {
        let remaining = ctx.release_one(name).ok_or_else(|| LockError::NotHeld {
            name: name.to_string(),
        })?;
        self.finish_release(ctx, name, remaining).await
    }

    /// Like [`release`](Self::release), but the error names the offending context.
    pub async fn release_safely(&self, ctx: &mut LockContext, name: &str) -> Result<()> {
        if !ctx.is_held(name) {
            return Err(LockError::InvalidRelease {
                context: ctx.label().to_string(),
                name: name.to_string(),
            });
        }
        self.release(ctx, name).await
    }

    async fn finish_release(&self, ctx: &LockContext, name: &str, remaining: u32) -> Result<()> {
        if remaining > 0 {
            debug!(lock = %name, context = %ctx.label(), remaining, "Released nested hold");
            return Ok(());
        }

        match self.backend.unclaim(name, ctx.id()).await {
            Ok(()) => {
                debug!(lock = %name, context = %ctx.label(), "Released lock");
                Ok(())
            }
            Err(BackendError::StaleSession { .. }) => {
                error!(
                    lock = %name,
                    context = %ctx.label(),
                    backend = self.backend.kind(),
                    "Claim vanished before release, tearing down backend"
                );
                if let Err(e) = self.backend.teardown().await {
                    warn!(error = %e, "Backend teardown after session loss failed");
                }
                Err(LockError::SessionLost {
                    name: name.to_string(),
                })
            }
            Err(BackendError::ClaimLost { .. }) => {
                warn!(lock = %name, context = %ctx.label(), "Claim expired before release");
                Err(LockError::ClaimLost {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hold `name` for the duration of `task`.
    ///
    /// The lock is released after `task` completes, even if it returns an
    /// error value. A failed release is reported instead of the task output.
    pub async fn run_exclusive<F, T>(
        &self,
        ctx: &mut LockContext,
        name: &str,
        max_wait: Duration,
        task: F,
    ) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if !self.acquire(ctx, name, max_wait).await {
            return Err(LockError::NotAcquired {
                name: name.to_string(),
            });
        }
        let output = task.await;
        self.release(ctx, name).await?;
        Ok(output)
    }

    /// Release backend client resources.
    ///
    /// Held claims are not released; callers should release first.
    /// Calling this more than once is harmless.
    pub async fn teardown(&self) -> Result<()> {
        info!(backend = self.backend.kind(), "Tearing down lock backend");
        self.backend.teardown().await?;
        Ok(())
    }
}
