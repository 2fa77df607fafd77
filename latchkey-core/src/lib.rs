//! Reentrant Distributed Locks
//!
//! This crate provides the acquisition/release protocol for locks whose
//! ownership is held by an external coordination service.
//!
//! ## Features
//!
//! - **Reentrancy** - Nested acquisitions by one caller context never hit the backend
//! - **Timeout-bounded retry** - Spin-poll acquisition with a wait budget
//! - **Pluggable backends** - Anything implementing [`LockBackend`]
//! - **In-memory backend** - [`MemoryBackend`] for tests and single-node use
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use latchkey_core::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LockError> {
//!     let lock = ReentrantLock::new(MemoryBackend::new());
//!     let mut ctx = LockContext::named("main");
//!
//!     if lock.acquire(&mut ctx, "my-resource", Duration::from_secs(30)).await {
//!         // Critical section
//!         lock.release(&mut ctx, "my-resource").await?;
//!     }
//!
//!     lock.teardown().await
//! }
//! ```

pub mod backend;
pub mod context;
pub mod error;
pub mod lock;
pub mod memory;
pub mod options;

pub use backend::{ClaimOutcome, LockBackend};
pub use context::{ContextId, LockContext};
pub use error::{BackendError, LockError, Result};
pub use lock::ReentrantLock;
pub use memory::{MemoryBackend, MemoryStats};
pub use options::{AcquireOptions, DEFAULT_MAX_WAIT, DEFAULT_RETRY_INTERVAL};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::backend::{ClaimOutcome, LockBackend};
    pub use crate::context::LockContext;
    pub use crate::error::{BackendError, LockError};
    pub use crate::lock::ReentrantLock;
    pub use crate::memory::MemoryBackend;
    pub use crate::options::AcquireOptions;
}
