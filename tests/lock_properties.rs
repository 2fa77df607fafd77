//! Integration tests for lock guarantees.
//!
//! These run against the in-process backend through the facade, so they
//! need no external services.

use latchkey::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const LOCK_NAME: &str = "self-increment";

async fn memory_lock() -> DistributedLock {
    connect_lock(BackendConfig::default()).await.unwrap()
}

// =============================================================================
// Mutual Exclusion
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_workers_never_overlap() {
    const WORKERS: usize = 50;
    const LOOPS: u64 = 10;

    let lock = Arc::new(memory_lock().await);
    let counter = Arc::new(AtomicU64::new(0));
    let inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for worker in 0..WORKERS {
        let lock = lock.clone();
        let counter = counter.clone();
        let inside = inside.clone();

        handles.push(tokio::spawn(async move {
            let mut ctx = LockContext::named(format!("worker-{worker}"));
            for _ in 0..LOOPS {
                while !lock
                    .acquire_with_retry(
                        &mut ctx,
                        LOCK_NAME,
                        Duration::from_millis(200),
                        Duration::from_millis(1),
                    )
                    .await
                {}

                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                // Non-atomic read-modify-write: lost updates show up if two
                // workers ever hold the lock together.
                let value = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(value + 1, Ordering::SeqCst);
                inside.fetch_sub(1, Ordering::SeqCst);

                lock.release(&mut ctx, LOCK_NAME).await.unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), WORKERS as u64 * LOOPS);
    lock.teardown().await.unwrap();
}

// =============================================================================
// Reentrancy
// =============================================================================

#[tokio::test]
async fn test_reentrant_hold_released_after_matching_releases() {
    let backend = Arc::new(MemoryBackend::new());
    let lock = ReentrantLock::new(backend.clone());
    let mut ctx = LockContext::named("main");

    assert!(lock.acquire(&mut ctx, LOCK_NAME, Duration::from_secs(1)).await);
    assert!(lock.acquire(&mut ctx, LOCK_NAME, Duration::from_secs(1)).await);
    assert_eq!(backend.stats().granted, 1);

    lock.release(&mut ctx, LOCK_NAME).await.unwrap();
    assert!(backend.is_claimed(LOCK_NAME));
    assert_eq!(backend.stats().released, 0);

    lock.release(&mut ctx, LOCK_NAME).await.unwrap();
    assert!(!backend.is_claimed(LOCK_NAME));
    assert_eq!(backend.stats().released, 1);
}

#[tokio::test]
async fn test_reentrancy_is_per_context() {
    let lock = memory_lock().await;
    let mut first = LockContext::named("first");
    let mut second = LockContext::named("second");

    assert!(lock.acquire(&mut first, LOCK_NAME, Duration::from_secs(1)).await);
    assert!(
        !lock
            .acquire_with_retry(
                &mut second,
                LOCK_NAME,
                Duration::from_millis(20),
                Duration::from_millis(5)
            )
            .await
    );
    assert_eq!(second.hold_count(LOCK_NAME), 0);
    assert_eq!(first.hold_count(LOCK_NAME), 1);
}

// =============================================================================
// Misuse
// =============================================================================

#[tokio::test]
async fn test_release_without_hold_fails() {
    let lock = memory_lock().await;
    let mut ctx = LockContext::named("main");

    let err = lock.release(&mut ctx, LOCK_NAME).await.unwrap_err();
    assert!(matches!(err, LockError::NotHeld { .. }));

    let err = lock.release_safely(&mut ctx, LOCK_NAME).await.unwrap_err();
    assert!(matches!(err, LockError::InvalidRelease { .. }));
    assert!(err.to_string().contains("'main'"));
}

#[tokio::test]
async fn test_release_from_other_context_fails() {
    let lock = memory_lock().await;
    let mut owner = LockContext::named("owner");
    let mut intruder = LockContext::named("intruder");

    assert!(lock.acquire(&mut owner, LOCK_NAME, Duration::from_secs(1)).await);
    let err = lock.release_safely(&mut intruder, LOCK_NAME).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "can not unlock, due to 'intruder' doesn't have lock 'self-increment'"
    );
    assert!(owner.is_held(LOCK_NAME));
}

// =============================================================================
// Timeouts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_honored_without_side_effects() {
    let backend = Arc::new(MemoryBackend::new());
    let lock = ReentrantLock::new(backend.clone());
    let mut holder = LockContext::named("holder");
    let mut waiter = LockContext::named("waiter");

    assert!(lock.acquire(&mut holder, LOCK_NAME, Duration::from_secs(1)).await);

    let start = Instant::now();
    let options = AcquireOptions::new(Duration::from_millis(200))
        .retry_interval(Duration::from_millis(50));
    assert!(!lock.acquire_with(&mut waiter, LOCK_NAME, &options).await);
    let waited = start.elapsed();

    assert!(waited >= Duration::from_millis(200), "waited {waited:?}");
    assert!(waited <= Duration::from_millis(250), "waited {waited:?}");
    assert_eq!(backend.stats().granted, 1);
    assert!(backend.stats().contended >= 4);
    assert!(!waiter.is_held(LOCK_NAME));
}

#[tokio::test(start_paused = true)]
async fn test_waiter_acquires_after_release() {
    let backend = Arc::new(MemoryBackend::new());
    let lock = Arc::new(ReentrantLock::new(backend.clone()));

    let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
    let holder_lock = lock.clone();
    let holder = tokio::spawn(async move {
        let mut ctx = LockContext::named("holder");
        assert!(holder_lock.acquire(&mut ctx, LOCK_NAME, Duration::from_secs(1)).await);
        acquired_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        holder_lock.release(&mut ctx, LOCK_NAME).await.unwrap();
    });

    acquired_rx.await.unwrap();
    let mut waiter = LockContext::named("waiter");
    assert!(lock.acquire(&mut waiter, LOCK_NAME, Duration::from_secs(1)).await);
    holder.await.unwrap();
    lock.release(&mut waiter, LOCK_NAME).await.unwrap();
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_round_trip_from_fresh_context() {
    let backend = Arc::new(MemoryBackend::new());
    let lock = ReentrantLock::new(backend.clone());

    let mut first = LockContext::named("first");
    assert!(lock.acquire(&mut first, LOCK_NAME, Duration::from_secs(1)).await);
    lock.release(&mut first, LOCK_NAME).await.unwrap();

    let mut fresh = LockContext::named("fresh");
    assert!(lock.acquire(&mut fresh, LOCK_NAME, Duration::from_millis(10)).await);
    assert_eq!(backend.stats().granted, 2);
    lock.release(&mut fresh, LOCK_NAME).await.unwrap();
}

#[tokio::test]
async fn test_teardown_after_release_is_idempotent() {
    let backend = Arc::new(MemoryBackend::new());
    let lock = ReentrantLock::new(backend.clone());
    let mut ctx = LockContext::named("main");

    assert!(lock.acquire(&mut ctx, LOCK_NAME, Duration::from_secs(1)).await);
    lock.release(&mut ctx, LOCK_NAME).await.unwrap();

    lock.teardown().await.unwrap();
    lock.teardown().await.unwrap();
    assert!(!backend.is_claimed(LOCK_NAME));

    // A torn-down backend fails fast.
    assert!(!lock.acquire(&mut ctx, LOCK_NAME, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_run_exclusive_through_facade() {
    let lock = memory_lock().await;
    let mut ctx = LockContext::named("main");

    let total = lock
        .run_exclusive(&mut ctx, LOCK_NAME, Duration::from_secs(1), async { 2 + 2 })
        .await
        .unwrap();

    assert_eq!(total, 4);
    assert!(!ctx.is_held(LOCK_NAME));
}

// =============================================================================
// Expiry
// =============================================================================

/// A holder whose claim expired still deletes the key on release, removing
/// the newer holder's claim. Owner-checked release modes exist to avoid this.
#[tokio::test]
async fn test_unconditional_release_after_expiry_removes_newer_claim() {
    let backend = Arc::new(MemoryBackend::new());
    let lock = ReentrantLock::new(backend.clone());
    let mut stale = LockContext::named("stale");
    let mut current = LockContext::named("current");

    assert!(lock.acquire(&mut stale, LOCK_NAME, Duration::from_millis(100)).await);
    assert!(backend.expire(LOCK_NAME));

    assert!(lock.acquire(&mut current, LOCK_NAME, Duration::from_secs(1)).await);
    assert_eq!(backend.holder(LOCK_NAME), Some(current.id()));
    lock.release(&mut stale, LOCK_NAME).await.unwrap();

    assert!(current.is_held(LOCK_NAME));
    assert!(!backend.is_claimed(LOCK_NAME));
}

#[tokio::test(start_paused = true)]
async fn test_lease_expiry_frees_crashed_holder() {
    let backend = Arc::new(MemoryBackend::with_lease_expiry());
    let lock = ReentrantLock::new(backend.clone());

    {
        let mut crashed = LockContext::named("crashed");
        assert!(lock.acquire(&mut crashed, LOCK_NAME, Duration::from_millis(300)).await);
        // Dropped without release.
    }

    let mut next = LockContext::named("next");
    assert!(
        lock.acquire_with_retry(
            &mut next,
            LOCK_NAME,
            Duration::from_secs(1),
            Duration::from_millis(50)
        )
        .await
    );
    lock.release(&mut next, LOCK_NAME).await.unwrap();
}
