//! Redis lock backend.
//!
//! Claims are `SET key token NX PX ttl`, where the token names this backend
//! instance and the claiming context. Release is a plain `DEL` by default, or
//! a compare-and-delete on that token when [`ReleaseMode::OwnerChecked`] is
//! configured.

use async_trait::async_trait;
use latchkey_core::{BackendError, ClaimOutcome, ContextId, LockBackend};
use parking_lot::RwLock;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{RedisConfig, ReleaseMode};
use crate::error::{RedisLockError, Result};

const BACKEND: &str = "redis";

/// Deletes the key only if it still carries our token.
const RELEASE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

/// Redis-based lock backend.
pub struct RedisBackend {
    config: RedisConfig,
    instance_id: String,
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisBackend {
    /// Connect to Redis.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use latchkey_redis::{RedisBackend, RedisConfig};
    ///
    /// let backend = RedisBackend::connect(RedisConfig::new("redis://127.0.0.1/")).await?;
    /// ```
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        config.validate()?;

        let client = redis::Client::open(config.connection_url()?)
            .map_err(|e| RedisLockError::Connection(e.to_string()))?;
        let conn = tokio::time::timeout(config.connection_timeout, client.get_connection_manager())
            .await
            .map_err(|_| RedisLockError::Timeout)??;

        info!(url = %config.url, "Connected to Redis lock backend");
        Ok(Self::from_connection(config, conn))
    }

    /// Create a backend over an existing connection.
    pub fn from_connection(config: RedisConfig, conn: ConnectionManager) -> Self {
        Self {
            config,
            instance_id: Uuid::new_v4().to_string(),
            conn: RwLock::new(Some(conn)),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Value stored under a key claimed by `owner` through this backend.
    ///
    /// Contexts sharing one backend get distinct tokens, so an owner-checked
    /// release from a context whose claim expired never matches the claim of
    /// the context that took over.
    pub fn claim_token(&self, owner: ContextId) -> String {
        claim_token(&self.instance_id, owner)
    }

    fn connection(&self) -> std::result::Result<ConnectionManager, BackendError> {
        self.conn.read().clone().ok_or(BackendError::Closed)
    }
}

fn claim_token(instance_id: &str, owner: ContextId) -> String {
    format!("{}:{}", instance_id, owner)
}

/// PX argument for a TTL; Redis rejects zero.
fn ttl_millis(ttl: Duration) -> std::result::Result<u64, BackendError> {
    if ttl.is_zero() {
        return Err(BackendError::InvalidArgument(
            "claim ttl must be non-zero".to_string(),
        ));
    }
    Ok((ttl.as_millis() as u64).max(1))
}

#[async_trait]
impl LockBackend for RedisBackend {
    fn kind(&self) -> &'static str {
        BACKEND
    }

    async fn claim(
        &self,
        name: &str,
        owner: ContextId,
        lease: Duration,
    ) -> std::result::Result<ClaimOutcome, BackendError> {
        let ttl_ms = ttl_millis(self.config.claim_ttl.resolve(lease))?;
        let key = self.config.key_for(name);
        let mut conn = self.connection()?;

        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(self.claim_token(owner))
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| BackendError::unavailable(BACKEND, e))?;

        if result.is_some() {
            debug!(lock = %name, ttl_ms, "Claimed Redis key");
            Ok(ClaimOutcome::Claimed)
        } else {
            debug!(lock = %name, "Redis key already claimed");
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    async fn unclaim(&self, name: &str, owner: ContextId) -> std::result::Result<(), BackendError> {
        let key = self.config.key_for(name);
        let mut conn = self.connection()?;

        match self.config.release_mode {
            ReleaseMode::Unconditional => {
                let deleted: u64 = conn
                    .del(&key)
                    .await
                    .map_err(|e| BackendError::unavailable(BACKEND, e))?;
                if deleted == 0 {
                    warn!(lock = %name, "Redis claim had already expired at release");
                } else {
                    debug!(lock = %name, "Deleted Redis key");
                }
                Ok(())
            }
            ReleaseMode::OwnerChecked => {
                let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
                    .key(&key)
                    .arg(self.claim_token(owner))
                    .invoke_async(&mut conn)
                    .await
                    .map_err(|e| BackendError::unavailable(BACKEND, e))?;
                if deleted == 1 {
                    debug!(lock = %name, "Deleted Redis key (owner checked)");
                    Ok(())
                } else {
                    Err(BackendError::ClaimLost {
                        name: name.to_string(),
                    })
                }
            }
        }
    }

    async fn teardown(&self) -> std::result::Result<(), BackendError> {
        if self.conn.write().take().is_some() {
            info!(url = %self.config.url, "Closed Redis lock backend");
        }
        Ok(())
    }
}
