//! The coordination-service-backed recovery store engine.

mod connection;
mod loader;
pub mod paths;
mod retry;

use crate::codec;
use crate::config::StoreConfig;
use crate::core::{
    ApplicationAttemptId, ApplicationId, ApplicationState, DelegationKey, DelegationTokenId,
    RecoveredState, Result, StoreError,
};
use crate::zk::{Acl, MultiOp, SessionEvent, ZkConnector, ZkError};
use connection::ConnectionManager;
use paths::StorePaths;
use retry::RetryExecutor;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Durable recovery store for a cluster resource manager, persisted in a
/// ZooKeeper-class coordination service.
///
/// Each persisted entity is one node; the node's existence is the entity's
/// existence. Public operations are processed with mutual exclusion — the
/// store trades throughput for a simple, provably consistent retry and
/// reconnect protocol.
///
/// # Examples
///
/// ```
/// use rmstore::zk::memory::MemoryCluster;
/// use rmstore::{ApplicationId, StoreConfig, ZkStateStore};
/// use rmstore::codec::ApplicationStateData;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cluster = MemoryCluster::new();
/// let store = ZkStateStore::new(StoreConfig::new("memory:2181"), cluster.connector())?;
/// store.start().await?;
///
/// let app_id = ApplicationId::new(1527000000, 1);
/// let blob = ApplicationStateData {
///     app_id: app_id.to_string(),
///     submit_time: 1000,
///     user: "alice".to_string(),
///     submission_context: vec![],
/// }
/// .to_bytes()?;
/// store.store_application(&app_id, &blob).await?;
///
/// let recovered = store.load().await?;
/// assert!(recovered.applications.contains_key(&app_id));
/// # Ok(())
/// # }
/// ```
pub struct ZkStateStore {
    working_path: String,
    acl: Vec<Acl>,
    paths: StorePaths,
    conn: Arc<ConnectionManager>,
    exec: RetryExecutor,
    inner: Mutex<PersisterState>,
}

struct PersisterState {
    /// Path of the sequence-marker node recorded by the last token store.
    /// Deliberately not read-verified before deletion; the loader tolerates
    /// a leftover marker from a crash between marker creation and tracking.
    dt_sequence_marker: Option<String>,
}

impl ZkStateStore {
    pub fn new(config: StoreConfig, connector: Arc<dyn ZkConnector>) -> Result<Self> {
        config.validate().map_err(StoreError::Config)?;
        let conn = Arc::new(ConnectionManager::new(connector, &config));
        let exec = RetryExecutor::new(conn.clone(), config.num_retries);
        Ok(Self {
            paths: StorePaths::new(&config.working_path),
            working_path: config.working_path,
            acl: config.acl,
            conn,
            exec,
            inner: Mutex::new(PersisterState {
                dt_sequence_marker: None,
            }),
        })
    }

    /// Connect and bootstrap the namespace roots. Root creation is
    /// idempotent; an already-existing root is success.
    pub async fn start(&self) -> Result<()> {
        let _guard = self.inner.lock().await;
        self.conn.connect().await?;

        self.create_root_dir(&self.working_path).await?;
        self.create_root_dir(&self.paths.root).await?;
        self.create_root_dir(&self.paths.secret_root).await?;
        self.create_root_dir(&self.paths.app_root).await?;
        Ok(())
    }

    async fn create_root_dir(&self, path: &str) -> Result<()> {
        match self.exec.create(path, &[], &self.acl).await {
            Err(StoreError::Coordination(ZkError::NodeExists(_))) => Ok(()),
            other => other.map(|_| ()),
        }
    }

    /// Persist an application's pre-serialized state blob.
    ///
    /// Storing an id that already has a node is a
    /// [`StoreError::AlreadyStored`] error; entities are never persisted
    /// twice without an intervening remove.
    pub async fn store_application(&self, app_id: &ApplicationId, state_blob: &[u8]) -> Result<()> {
        let _guard = self.inner.lock().await;
        let path = self.paths.app_node(&app_id.to_string());
        debug!(%app_id, path = %path, "storing application state");
        match self.exec.create(&path, state_blob, &self.acl).await {
            Err(StoreError::Coordination(ZkError::NodeExists(path))) => {
                Err(StoreError::AlreadyStored(path))
            }
            other => other.map(|_| ()),
        }
    }

    /// Persist an attempt's pre-serialized state blob.
    pub async fn store_application_attempt(
        &self,
        attempt_id: &ApplicationAttemptId,
        state_blob: &[u8],
    ) -> Result<()> {
        let _guard = self.inner.lock().await;
        let path = self.paths.app_node(&attempt_id.to_string());
        debug!(%attempt_id, path = %path, "storing attempt state");
        match self.exec.create(&path, state_blob, &self.acl).await {
            Err(StoreError::Coordination(ZkError::NodeExists(path))) => {
                Err(StoreError::AlreadyStored(path))
            }
            other => other.map(|_| ()),
        }
    }

    /// Remove an application and all of its attempt nodes in one atomic
    /// transaction. Either the whole set disappears or nothing does.
    pub async fn remove_application(&self, app: &ApplicationState) -> Result<()> {
        let _guard = self.inner.lock().await;
        let app_path = self.paths.app_node(&app.app_id.to_string());
        let mut ops = vec![MultiOp::Delete {
            path: app_path.clone(),
            version: None,
        }];
        for attempt_id in app.attempts.keys() {
            ops.push(MultiOp::Delete {
                path: self.paths.app_node(&attempt_id.to_string()),
                version: None,
            });
        }
        debug!(app_id = %app.app_id, path = %app_path, "removing application and its attempts");
        self.exec.multi(ops).await
    }

    /// Persist a delegation token and advance the sequence-number marker in
    /// one atomic transaction: create the token node, delete the previously
    /// tracked marker (if any), create the new marker.
    pub async fn store_delegation_token_and_sequence_number(
        &self,
        token: &DelegationTokenId,
        renew_date: u64,
        sequence_number: u64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let token_path = self
            .paths
            .secret_node(&StorePaths::delegation_token_name(token.sequence_number));
        let marker_path = self
            .paths
            .secret_node(&StorePaths::sequence_number_name(sequence_number));
        debug!(path = %token_path, sequence_number, "storing delegation token");

        let mut ops = vec![MultiOp::Create {
            path: token_path,
            data: codec::encode_token_node(&token.identifier, renew_date),
            acl: self.acl.clone(),
        }];
        if let Some(old_marker) = inner.dt_sequence_marker.take() {
            ops.push(MultiOp::Delete {
                path: old_marker,
                version: None,
            });
        }
        ops.push(MultiOp::Create {
            path: marker_path.clone(),
            data: Vec::new(),
            acl: self.acl.clone(),
        });
        // Tracked before the transaction runs, matching the original
        // at-least-one-marker-surviving contract.
        inner.dt_sequence_marker = Some(marker_path);

        self.exec.multi(ops).await
    }

    pub async fn remove_delegation_token(&self, token: &DelegationTokenId) -> Result<()> {
        let _guard = self.inner.lock().await;
        let path = self
            .paths
            .secret_node(&StorePaths::delegation_token_name(token.sequence_number));
        debug!(path = %path, "removing delegation token");
        self.exec.delete(&path, None).await
    }

    pub async fn store_delegation_key(&self, key: &DelegationKey) -> Result<()> {
        let _guard = self.inner.lock().await;
        let path = self
            .paths
            .secret_node(&StorePaths::delegation_key_name(key.key_id));
        debug!(path = %path, "storing delegation master key");
        self.exec
            .create(&path, &codec::encode_delegation_key(key), &self.acl)
            .await
            .map(|_| ())
    }

    pub async fn remove_delegation_key(&self, key: &DelegationKey) -> Result<()> {
        let _guard = self.inner.lock().await;
        let path = self
            .paths
            .secret_node(&StorePaths::delegation_key_name(key.key_id));
        debug!(path = %path, "removing delegation master key");
        self.exec.delete(&path, None).await
    }

    /// Scan the full namespace and reconstruct the recovered state,
    /// repairing orphaned attempt nodes along the way.
    pub async fn load(&self) -> Result<RecoveredState> {
        let _guard = self.inner.lock().await;
        loader::load_state(&self.exec, &self.paths).await
    }

    /// Apply a session event reported by the coordination client. Production
    /// connectors forward their watcher callbacks here.
    pub async fn process_session_event(&self, event: SessionEvent) -> Result<()> {
        self.conn.process_session_event(event).await
    }

    pub async fn close(&self) {
        self.conn.close().await;
    }
}
