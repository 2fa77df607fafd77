//! ZooKeeper lock backend.
//!
//! A claim is an ephemeral node under the configured root. ZooKeeper lets
//! only one client create a given path and removes the node when the
//! creating session ends, so a crashed holder never blocks others for longer
//! than the session timeout.

use async_trait::async_trait;
use latchkey_core::{BackendError, ClaimOutcome, ContextId, LockBackend};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zookeeper_client::{Acls, Client, CreateMode, SessionState};

use crate::config::{RetryPolicy, ZooKeeperConfig};
use crate::error::{Result, ZooKeeperLockError};

const BACKEND: &str = "zookeeper";

/// ZooKeeper-based lock backend.
pub struct ZooKeeperBackend {
    config: ZooKeeperConfig,
    instance_id: String,
    client: RwLock<Option<Client>>,
    state_logger: Mutex<Option<JoinHandle<()>>>,
}

impl ZooKeeperBackend {
    /// Connect to ZooKeeper and make sure the lock root exists.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use latchkey_zookeeper::{ZooKeeperBackend, ZooKeeperConfig};
    ///
    /// let backend = ZooKeeperBackend::connect(ZooKeeperConfig::new("zk1:2181,zk2:2181")).await?;
    /// ```
    pub async fn connect(config: ZooKeeperConfig) -> Result<Self> {
        config.validate()?;

        let mut connector = Client::connector();
        connector.session_timeout(config.session_timeout);
        let client = tokio::time::timeout(
            config.connection_timeout,
            connector.connect(&config.connect_string),
        )
        .await
        .map_err(|_| ZooKeeperLockError::Timeout(config.connect_string.clone()))??;

        info!(connect = %config.connect_string, "ZooKeeper connection created");
        ensure_root(&client, &config).await?;

        let state_logger = tokio::spawn(log_session_states(client.clone(), config.session_timeout));

        Ok(Self {
            config,
            instance_id: Uuid::new_v4().to_string(),
            client: RwLock::new(Some(client)),
            state_logger: Mutex::new(Some(state_logger)),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ZooKeeperConfig {
        &self.config
    }

    /// Data written to a lock node created for `owner` through this backend.
    pub fn node_data(&self, owner: ContextId) -> String {
        node_data(&self.instance_id, owner)
    }

    /// Full node path for a lock name.
    pub fn node_path(&self, name: &str) -> std::result::Result<String, BackendError> {
        node_path(&self.config.root, name)
    }

    fn client(&self) -> std::result::Result<Client, BackendError> {
        self.client.read().clone().ok_or(BackendError::Closed)
    }
}

fn node_data(instance_id: &str, owner: ContextId) -> String {
    format!("{}:{}", instance_id, owner)
}

/// Lock names map to a single path segment below the root.
fn node_path(root: &str, name: &str) -> std::result::Result<String, BackendError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(BackendError::InvalidArgument(format!(
            "'{}' is not a valid lock node name",
            name
        )));
    }
    Ok(format!("{}/{}", root.trim_end_matches('/'), name))
}

async fn ensure_root(client: &Client, config: &ZooKeeperConfig) -> Result<()> {
    let options = CreateMode::Persistent.with_acls(Acls::anyone_all());
    for path in config.root_ancestors() {
        match client.create(&path, &[], &options).await {
            Ok(_) => debug!(path = %path, "Created lock root node"),
            Err(zookeeper_client::Error::NodeExists) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Session-state notifications are diagnostics only; lock correctness never
/// depends on them.
async fn log_session_states(client: Client, session_timeout: Duration) {
    let mut watcher = client.state_watcher();
    drop(client);
    loop {
        match watcher.changed().await {
            SessionState::SyncConnected => info!("ZooKeeper session connected"),
            SessionState::ConnectedReadOnly => warn!("ZooKeeper session connected read-only"),
            SessionState::Disconnected => warn!(
                session_timeout_ms = session_timeout.as_millis() as u64,
                "Disconnected from ZooKeeper, lock nodes survive until session timeout"
            ),
            SessionState::Expired => {
                error!("ZooKeeper session expired, lock nodes were removed");
                break;
            }
            SessionState::AuthFailed => {
                error!("ZooKeeper authentication failed");
                break;
            }
            SessionState::Closed => {
                info!("ZooKeeper session closed");
                break;
            }
            #[allow(unreachable_patterns)]
            other => debug!(state = ?other, "ZooKeeper session state changed"),
        }
    }
}

fn is_transient(err: &zookeeper_client::Error) -> bool {
    matches!(
        err,
        zookeeper_client::Error::ConnectionLoss | zookeeper_client::Error::Timeout
    )
}

/// Delete a lock node, retrying transient failures with backoff.
///
/// A missing node on the first attempt means the session that created it is
/// gone. After a retry it only means an earlier attempt reached the server
/// before the connection dropped, so the node counts as deleted.
async fn delete_with_retry<F, Fut>(
    name: &str,
    path: &str,
    retry: RetryPolicy,
    mut delete: F,
) -> std::result::Result<(), BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), zookeeper_client::Error>>,
{
    let mut attempt = 0;
    loop {
        match delete().await {
            Ok(()) => {
                debug!(lock = %name, path = %path, "Deleted lock node");
                return Ok(());
            }
            Err(zookeeper_client::Error::NoNode) if attempt > 0 => {
                debug!(lock = %name, path = %path, attempt, "Lock node deleted by an earlier attempt");
                return Ok(());
            }
            Err(zookeeper_client::Error::NoNode | zookeeper_client::Error::SessionExpired) => {
                return Err(BackendError::StaleSession {
                    name: name.to_string(),
                });
            }
            Err(zookeeper_client::Error::ClientClosed) => return Err(BackendError::Closed),
            Err(e) if is_transient(&e) && attempt < retry.max_retries => {
                let sleep = retry.backoff(attempt);
                warn!(
                    lock = %name,
                    attempt,
                    sleep_ms = sleep.as_millis() as u64,
                    error = %e,
                    "Retrying lock node delete"
                );
                tokio::time::sleep(sleep).await;
                attempt += 1;
            }
            Err(e) => return Err(BackendError::unavailable(BACKEND, e)),
        }
    }
}

#[async_trait]
impl LockBackend for ZooKeeperBackend {
    fn kind(&self) -> &'static str {
        BACKEND
    }

    async fn claim(
        &self,
        name: &str,
        owner: ContextId,
        _lease: Duration,
    ) -> std::result::Result<ClaimOutcome, BackendError> {
        let path = self.node_path(name)?;
        let client = self.client()?;
        let options = CreateMode::Ephemeral.with_acls(Acls::anyone_all());
        let data = self.node_data(owner);

        match client.create(&path, data.as_bytes(), &options).await {
            Ok(_) => {
                debug!(lock = %name, path = %path, "Created ephemeral lock node");
                Ok(ClaimOutcome::Claimed)
            }
            Err(zookeeper_client::Error::NodeExists) => {
                debug!(lock = %name, "Lock node already exists");
                Ok(ClaimOutcome::AlreadyClaimed)
            }
            Err(zookeeper_client::Error::ClientClosed) => Err(BackendError::Closed),
            Err(e) => Err(BackendError::unavailable(BACKEND, e)),
        }
    }

    /// Delete the lock node, retrying through connection loss.
    async fn unclaim(&self, name: &str, _owner: ContextId) -> std::result::Result<(), BackendError> {
        let path = self.node_path(name)?;
        let client = self.client()?;

        delete_with_retry(name, &path, self.config.retry, || client.delete(&path, None)).await
    }

    async fn teardown(&self) -> std::result::Result<(), BackendError> {
        if let Some(handle) = self.state_logger.lock().take() {
            handle.abort();
        }
        if self.client.write().take().is_some() {
            info!(connect = %self.config.connect_string, "Closed ZooKeeper lock backend");
        }
        Ok(())
    }
}
