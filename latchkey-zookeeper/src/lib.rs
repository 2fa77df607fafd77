//! # Latchkey ZooKeeper
//!
//! ZooKeeper backend for latchkey distributed locks.
//!
//! Each lock is an ephemeral node at `<root>/<name>`. Claim lifetime is tied
//! to the client session rather than to the caller's wait budget: the node
//! disappears when the session ends, whether through teardown, a crash or a
//! partition longer than the session timeout.
//!
//! A release that finds the node already gone means the session dropped it
//! underneath us. The backend reports this as
//! [`BackendError::StaleSession`](latchkey_core::BackendError::StaleSession)
//! and the lock core tears the client down.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use latchkey_core::{LockContext, ReentrantLock};
//! use latchkey_zookeeper::{ZooKeeperBackend, ZooKeeperConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ZooKeeperConfig::builder()
//!         .connect_string("localhost:2181")
//!         .root("/services/billing/locks")
//!         .build();
//!
//!     let lock = ReentrantLock::new(ZooKeeperBackend::connect(config).await?);
//!     let mut ctx = LockContext::new();
//!
//!     if lock.acquire(&mut ctx, "invoice-run", Duration::from_secs(10)).await {
//!         lock.release(&mut ctx, "invoice-run").await?;
//!     }
//!
//!     lock.teardown().await?;
//!     Ok(())
//! }
//! ```

mod backend;
mod config;
mod error;

pub use backend::ZooKeeperBackend;
pub use config::{RetryPolicy, ZooKeeperConfig, ZooKeeperConfigBuilder};
pub use error::{Result, ZooKeeperLockError};

pub use zookeeper_client;
