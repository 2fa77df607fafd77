//! Redis backend configuration.

use latchkey_core::options::millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RedisLockError, Result};

/// How long a claim key lives in Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ClaimTtl {
    /// Use the caller's wait budget as the key TTL.
    ///
    /// A long wait budget therefore also means a long window before a
    /// crashed holder's claim expires.
    MaxWait,
    /// Use a fixed TTL regardless of the wait budget.
    Fixed {
        /// Key TTL.
        #[serde(with = "millis")]
        ttl: Duration,
    },
}

impl ClaimTtl {
    /// Resolve the TTL for a claim made with the given wait budget.
    pub fn resolve(&self, max_wait: Duration) -> Duration {
        match self {
            Self::MaxWait => max_wait,
            Self::Fixed { ttl } => *ttl,
        }
    }
}

/// How claims are deleted on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseMode {
    /// Plain `DEL`. May delete a newer holder's key if ours already expired.
    #[default]
    Unconditional,
    /// Compare-and-delete against this backend's owner token.
    OwnerChecked,
}

/// Redis backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL (redis://host:port or rediss://host:port for TLS).
    pub url: String,
    /// Database number (0-15).
    pub database: Option<u8>,
    /// Username for Redis 6+ ACL.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Prefix prepended to every lock name.
    #[serde(default)]
    pub key_prefix: String,
    /// Claim TTL policy.
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl: ClaimTtl,
    /// Release policy.
    #[serde(default)]
    pub release_mode: ReleaseMode,
    /// Connection timeout.
    #[serde(with = "millis", default = "default_connection_timeout")]
    pub connection_timeout: Duration,
}

fn default_claim_ttl() -> ClaimTtl {
    ClaimTtl::MaxWait
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            database: None,
            username: None,
            password: None,
            key_prefix: String::new(),
            claim_ttl: default_claim_ttl(),
            release_mode: ReleaseMode::default(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

impl RedisConfig {
    /// Create a new configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create a builder.
    pub fn builder() -> RedisConfigBuilder {
        RedisConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> RedisConfigBuilder {
        let mut builder = RedisConfigBuilder::new();

        if let Ok(url) = std::env::var("LATCHKEY_REDIS_URL") {
            builder = builder.url(url);
        }

        if let Ok(db) = std::env::var("LATCHKEY_REDIS_DATABASE")
            && let Ok(db_num) = db.parse()
        {
            builder = builder.database(db_num);
        }

        if let Ok(username) = std::env::var("LATCHKEY_REDIS_USERNAME") {
            builder = builder.username(username);
        }

        if let Ok(password) = std::env::var("LATCHKEY_REDIS_PASSWORD") {
            builder = builder.password(password);
        }

        if let Ok(prefix) = std::env::var("LATCHKEY_REDIS_KEY_PREFIX") {
            builder = builder.key_prefix(prefix);
        }

        if let Ok(ttl) = std::env::var("LATCHKEY_REDIS_CLAIM_TTL_MS")
            && let Ok(ms) = ttl.parse()
        {
            builder = builder.claim_ttl(ClaimTtl::Fixed {
                ttl: Duration::from_millis(ms),
            });
        }

        if std::env::var("LATCHKEY_REDIS_OWNER_CHECKED").is_ok() {
            builder = builder.release_mode(ReleaseMode::OwnerChecked);
        }

        builder
    }

    /// Get the full Redis URL with auth and database.
    ///
    /// A configured database replaces any database already in the URL path.
    pub fn connection_url(&self) -> Result<String> {
        let mut url = self.parsed_url()?;

        if let Some(password) = &self.password {
            let username = self.username.as_deref().unwrap_or("");
            url.set_username(username)
                .and_then(|()| url.set_password(Some(password)))
                .map_err(|()| {
                    RedisLockError::Config(format!("url '{}' cannot carry credentials", self.url))
                })?;
        }

        if let Some(db) = self.database {
            url.set_path(&format!("/{}", db));
        }

        Ok(url.into())
    }

    fn parsed_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.url)
            .map_err(|e| RedisLockError::Config(format!("invalid url '{}': {}", self.url, e)))
    }

    /// Check that the configuration can produce a usable connection.
    pub fn validate(&self) -> Result<()> {
        let parsed = self.parsed_url()?;

        if !matches!(parsed.scheme(), "redis" | "rediss") {
            return Err(RedisLockError::Config(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        if let ClaimTtl::Fixed { ttl } = self.claim_ttl
            && ttl.is_zero()
        {
            return Err(RedisLockError::Config("fixed claim ttl must be non-zero".into()));
        }

        Ok(())
    }

    /// Redis key for a lock name.
    pub fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }
}

/// Builder for Redis configuration.
#[derive(Default)]
pub struct RedisConfigBuilder {
    config: RedisConfig,
}

impl RedisConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RedisConfig::default(),
        }
    }

    /// Set the Redis URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Set the database number.
    pub fn database(mut self, db: u8) -> Self {
        self.config.database = Some(db);
        self
    }

    /// Set the username (Redis 6+ ACL).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Set the claim TTL policy.
    pub fn claim_ttl(mut self, claim_ttl: ClaimTtl) -> Self {
        self.config.claim_ttl = claim_ttl;
        self
    }

    /// Set the release policy.
    pub fn release_mode(mut self, mode: ReleaseMode) -> Self {
        self.config.release_mode = mode;
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RedisConfig {
        self.config
    }
}
