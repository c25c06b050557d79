//! Retryable operation executor: the sole I/O path to the live handle.
//!
//! Every primitive the persister and loader issue goes through [`run`]: wait
//! for a live handle (bounded by the session timeout), execute, and retry
//! transient failure codes up to the configured bound. All other failure
//! codes propagate unmodified.

use super::connection::ConnectionManager;
use crate::core::{Result, StoreError};
use crate::zk::{Acl, MultiOp, ZkHandle, ZkResult};
use std::sync::Arc;
use tracing::{error, warn};

/// Descriptor of one primitive operation, re-runnable across retries.
pub(crate) enum ZkOp {
    Create {
        path: String,
        data: Vec<u8>,
        acl: Vec<Acl>,
    },
    Delete {
        path: String,
        version: Option<i64>,
    },
    GetData {
        path: String,
    },
    SetData {
        path: String,
        data: Vec<u8>,
        version: Option<i64>,
    },
    GetChildren {
        path: String,
    },
    Multi {
        ops: Vec<MultiOp>,
    },
}

pub(crate) enum ZkOpOutcome {
    Created(String),
    Done,
    Data(Vec<u8>),
    Children(Vec<String>),
}

impl ZkOp {
    async fn apply(&self, handle: &dyn ZkHandle) -> ZkResult<ZkOpOutcome> {
        match self {
            ZkOp::Create { path, data, acl } => {
                handle.create(path, data, acl).await.map(ZkOpOutcome::Created)
            }
            ZkOp::Delete { path, version } => {
                // Deleting a missing node is a caller bug worth a log line;
                // the delete still runs so the error reaches the caller.
                if !handle.exists(path).await? {
                    error!(path = %path, "trying to delete a path that does not exist");
                }
                handle.delete(path, *version).await.map(|_| ZkOpOutcome::Done)
            }
            ZkOp::GetData { path } => handle.get_data(path).await.map(ZkOpOutcome::Data),
            ZkOp::SetData {
                path,
                data,
                version,
            } => handle
                .set_data(path, data, *version)
                .await
                .map(|_| ZkOpOutcome::Done),
            ZkOp::GetChildren { path } => {
                handle.get_children(path).await.map(ZkOpOutcome::Children)
            }
            ZkOp::Multi { ops } => handle.multi(ops).await.map(|_| ZkOpOutcome::Done),
        }
    }
}

pub(crate) struct RetryExecutor {
    conn: Arc<ConnectionManager>,
    num_retries: u32,
}

impl RetryExecutor {
    pub(crate) fn new(conn: Arc<ConnectionManager>, num_retries: u32) -> Self {
        Self { conn, num_retries }
    }

    pub(crate) async fn run(&self, op: ZkOp) -> Result<ZkOpOutcome> {
        let mut retry = 0u32;
        loop {
            let handle = self.conn.live_handle().await?;
            match op.apply(handle.as_ref()).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() && retry + 1 < self.num_retries => {
                    retry += 1;
                    warn!(error = %err, retry, "transient coordination failure, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub(crate) async fn create(&self, path: &str, data: &[u8], acl: &[Acl]) -> Result<String> {
        match self
            .run(ZkOp::Create {
                path: path.to_string(),
                data: data.to_vec(),
                acl: acl.to_vec(),
            })
            .await?
        {
            ZkOpOutcome::Created(path) => Ok(path),
            _ => unreachable!("create yields Created"),
        }
    }

    pub(crate) async fn delete(&self, path: &str, version: Option<i64>) -> Result<()> {
        self.run(ZkOp::Delete {
            path: path.to_string(),
            version,
        })
        .await
        .map(|_| ())
    }

    pub(crate) async fn get_data(&self, path: &str) -> Result<Vec<u8>> {
        match self
            .run(ZkOp::GetData {
                path: path.to_string(),
            })
            .await?
        {
            ZkOpOutcome::Data(data) => Ok(data),
            _ => unreachable!("get_data yields Data"),
        }
    }

    pub(crate) async fn set_data(
        &self,
        path: &str,
        data: &[u8],
        version: Option<i64>,
    ) -> Result<()> {
        self.run(ZkOp::SetData {
            path: path.to_string(),
            data: data.to_vec(),
            version,
        })
        .await
        .map(|_| ())
    }

    pub(crate) async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        match self
            .run(ZkOp::GetChildren {
                path: path.to_string(),
            })
            .await?
        {
            ZkOpOutcome::Children(children) => Ok(children),
            _ => unreachable!("get_children yields Children"),
        }
    }

    pub(crate) async fn multi(&self, ops: Vec<MultiOp>) -> Result<()> {
        self.run(ZkOp::Multi { ops }).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::zk::ZkError;
    use crate::zk::memory::MemoryCluster;
    use std::time::Duration;

    async fn executor(cluster: &MemoryCluster, num_retries: u32) -> RetryExecutor {
        let config = StoreConfig::new("memory:2181")
            .session_timeout(Duration::from_millis(200))
            .num_retries(num_retries);
        let conn = Arc::new(ConnectionManager::new(cluster.connector(), &config));
        conn.connect().await.unwrap();
        RetryExecutor::new(conn, num_retries)
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let cluster = MemoryCluster::new();
        let exec = executor(&cluster, 3).await;

        cluster.inject_errors([ZkError::ConnectionLoss]);
        exec.create("/a", b"x", &[]).await.unwrap();
        assert!(cluster.node_exists("/a"));
    }

    #[tokio::test]
    async fn test_retry_bound_propagates_original_error() {
        let cluster = MemoryCluster::new();
        let exec = executor(&cluster, 3).await;

        cluster.inject_errors([
            ZkError::ConnectionLoss,
            ZkError::OperationTimeout,
            ZkError::ConnectionLoss,
        ]);
        let err = exec.create("/a", b"x", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Coordination(ZkError::ConnectionLoss)
        ));
        assert!(!cluster.node_exists("/a"));
    }

    #[tokio::test]
    async fn test_set_data_replaces_node_data() {
        let cluster = MemoryCluster::new();
        let exec = executor(&cluster, 3).await;

        exec.create("/a", b"old", &[]).await.unwrap();
        cluster.inject_errors([ZkError::ConnectionLoss]);
        exec.set_data("/a", b"new", None).await.unwrap();
        assert_eq!(cluster.data_of("/a").unwrap(), b"new");

        // Version conflicts are permanent failures, not retried.
        let err = exec.set_data("/a", b"stale", Some(0)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Coordination(ZkError::BadVersion(_))
        ));
        assert_eq!(cluster.data_of("/a").unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let cluster = MemoryCluster::new();
        let exec = executor(&cluster, 3).await;

        exec.create("/a", b"x", &[]).await.unwrap();
        let err = exec.create("/a", b"y", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Coordination(ZkError::NodeExists(_))
        ));
        // The original data was never overwritten.
        assert_eq!(cluster.data_of("/a").unwrap(), b"x");
    }
}
