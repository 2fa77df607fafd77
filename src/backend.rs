//! Backend selection.
//!
//! [`Backend`] is the closed set of coordination services latchkey can run
//! on. Code that does not care which one is configured holds a
//! [`DistributedLock`] and never names an adapter type.

use async_trait::async_trait;
use latchkey_core::{BackendError, ClaimOutcome, ContextId, LockBackend, MemoryBackend, ReentrantLock};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::{ConnectError, ConnectResult};

#[cfg(feature = "redis")]
use latchkey_redis::{RedisBackend, RedisConfig};
#[cfg(feature = "zookeeper")]
use latchkey_zookeeper::{ZooKeeperBackend, ZooKeeperConfig};

/// Lock handle over whichever backend was configured.
pub type DistributedLock = ReentrantLock<Backend>;

/// Which coordination service to use, and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-process claims; exclusive within this process only.
    Memory {
        /// Expire claims after their lease.
        #[serde(default)]
        lease_expiry: bool,
    },
    /// Redis `SET NX PX` claims.
    #[cfg(feature = "redis")]
    Redis(RedisConfig),
    /// ZooKeeper ephemeral nodes.
    #[cfg(feature = "zookeeper")]
    #[serde(rename = "zookeeper")]
    ZooKeeper(ZooKeeperConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Memory {
            lease_expiry: false,
        }
    }
}

impl BackendConfig {
    /// Select a backend from `LATCHKEY_BACKEND` (`memory`, `redis`, `zookeeper`).
    ///
    /// Adapter settings come from each adapter's own environment variables.
    /// Defaults to the memory backend when unset.
    pub fn from_env() -> ConnectResult<Self> {
        let kind = std::env::var("LATCHKEY_BACKEND").unwrap_or_else(|_| "memory".to_string());
        Self::from_kind(&kind)
    }

    fn from_kind(kind: &str) -> ConnectResult<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::default()),
            #[cfg(feature = "redis")]
            "redis" => Ok(Self::Redis(RedisConfig::from_env().build())),
            #[cfg(feature = "zookeeper")]
            "zookeeper" | "zk" => Ok(Self::ZooKeeper(ZooKeeperConfig::from_env().build())),
            other => Err(ConnectError::Config(format!(
                "unknown or disabled backend '{}'",
                other
            ))),
        }
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> ConnectResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A connected coordination backend.
pub enum Backend {
    /// In-process backend.
    Memory(MemoryBackend),
    /// Redis backend.
    #[cfg(feature = "redis")]
    Redis(RedisBackend),
    /// ZooKeeper backend.
    #[cfg(feature = "zookeeper")]
    ZooKeeper(ZooKeeperBackend),
}

impl Backend {
    /// Connect to the configured backend.
    pub async fn connect(config: BackendConfig) -> ConnectResult<Self> {
        let backend = match config {
            BackendConfig::Memory { lease_expiry } => Self::Memory(if lease_expiry {
                MemoryBackend::with_lease_expiry()
            } else {
                MemoryBackend::new()
            }),
            #[cfg(feature = "redis")]
            BackendConfig::Redis(config) => Self::Redis(RedisBackend::connect(config).await?),
            #[cfg(feature = "zookeeper")]
            BackendConfig::ZooKeeper(config) => {
                Self::ZooKeeper(ZooKeeperBackend::connect(config).await?)
            }
        };
        info!(backend = backend.kind(), "Lock backend ready");
        Ok(backend)
    }

    fn inner(&self) -> &dyn LockBackend {
        match self {
            Self::Memory(backend) => backend,
            #[cfg(feature = "redis")]
            Self::Redis(backend) => backend,
            #[cfg(feature = "zookeeper")]
            Self::ZooKeeper(backend) => backend,
        }
    }
}

impl From<MemoryBackend> for Backend {
    fn from(backend: MemoryBackend) -> Self {
        Self::Memory(backend)
    }
}

#[cfg(feature = "redis")]
impl From<RedisBackend> for Backend {
    fn from(backend: RedisBackend) -> Self {
        Self::Redis(backend)
    }
}

#[cfg(feature = "zookeeper")]
impl From<ZooKeeperBackend> for Backend {
    fn from(backend: ZooKeeperBackend) -> Self {
        Self::ZooKeeper(backend)
    }
}

#[async_trait]
impl LockBackend for Backend {
    fn kind(&self) -> &'static str {
        self.inner().kind()
    }

    async fn claim(&self, name: &str, owner: ContextId, lease: Duration) -> Result<ClaimOutcome, BackendError> {
        self.inner().claim(name, owner, lease).await
    }

    async fn unclaim(&self, name: &str, owner: ContextId) -> Result<(), BackendError> {
        self.inner().unclaim(name, owner).await
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        self.inner().teardown().await
    }
}

/// Connect the configured backend and wrap it in a lock handle.
pub async fn connect_lock(config: BackendConfig) -> ConnectResult<DistributedLock> {
    Ok(ReentrantLock::new(Backend::connect(config).await?))
}
