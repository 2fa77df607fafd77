//! # Latchkey Redis
//!
//! Redis backend for latchkey distributed locks.
//!
//! A claim is a key written with `SET NX PX`, so a crashed holder's claim
//! expires on its own. By default the key TTL equals the caller's wait
//! budget; see [`ClaimTtl`] to decouple them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use latchkey_core::{LockContext, ReentrantLock};
//! use latchkey_redis::{RedisBackend, RedisConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://localhost:6379")
//!         .key_prefix("locks:")
//!         .build();
//!
//!     let lock = ReentrantLock::new(RedisBackend::connect(config).await?);
//!     let mut ctx = LockContext::new();
//!
//!     if lock.acquire(&mut ctx, "billing", Duration::from_secs(10)).await {
//!         // Critical section
//!         lock.release(&mut ctx, "billing").await?;
//!     }
//!
//!     lock.teardown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Release Semantics
//!
//! [`ReleaseMode::Unconditional`] deletes the key without checking who wrote
//! it. If our claim expired while we still believed we held the lock, the
//! delete can remove another holder's claim. [`ReleaseMode::OwnerChecked`]
//! compares the stored owner token first and reports a lost claim instead.

mod backend;
mod config;
mod error;

pub use backend::RedisBackend;
pub use config::{ClaimTtl, RedisConfig, RedisConfigBuilder, ReleaseMode};
pub use error::{RedisLockError, Result};

// Re-export redis crate for convenience
pub use redis;
