// Latchkey - reentrant distributed locks for Rust
//
// This library wraps a coordination service (Redis, ZooKeeper) in a
// process-local, reentrant lock handle with timeout-bounded acquisition.

// Re-export core functionality
pub use latchkey_core::*;

// Re-export backend adapters
#[cfg(feature = "redis")]
pub use latchkey_redis;

#[cfg(feature = "zookeeper")]
pub use latchkey_zookeeper;

pub mod backend;
pub mod error;
pub mod logging;

pub use backend::{Backend, BackendConfig, DistributedLock, connect_lock};
pub use error::{ConnectError, ConnectResult};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AcquireOptions,
        Backend,
        BackendConfig,
        BackendError,
        ClaimOutcome,
        DistributedLock,
        LockBackend,
        LockContext,
        LockError,
        MemoryBackend,
        ReentrantLock,
        connect_lock,
    };

    #[cfg(feature = "redis")]
    pub use latchkey_redis::{RedisBackend, RedisConfig};

    #[cfg(feature = "zookeeper")]
    pub use latchkey_zookeeper::{ZooKeeperBackend, ZooKeeperConfig};
}
