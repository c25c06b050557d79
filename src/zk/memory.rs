//! In-process coordination service.
//!
//! A miniature, single-process stand-in for a replicated coordination
//! service: hierarchical namespace, parent-checked creates, versioned nodes,
//! all-or-nothing multi batches, and scripted fault injection. Tests and
//! examples run the store against this backend; production deployments plug
//! a real client in through [`ZkConnector`].

use super::{Acl, MultiOp, ZkConnector, ZkError, ZkHandle, ZkResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct NodeRecord {
    data: Vec<u8>,
    version: i64,
}

#[derive(Default)]
struct ClusterState {
    tree: BTreeMap<String, NodeRecord>,
    injected: VecDeque<ZkError>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<ClusterState>,
    connect_failures: AtomicU32,
}

/// Shared in-process namespace plus the knobs tests use to shake it.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Inner>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector handing out sessions against this cluster.
    pub fn connector(&self) -> Arc<dyn ZkConnector> {
        Arc::new(MemoryConnector {
            inner: self.inner.clone(),
        })
    }

    /// Queue errors consumed one per subsequent primitive operation, in order.
    pub fn inject_errors<I>(&self, errors: I)
    where
        I: IntoIterator<Item = ZkError>,
    {
        let mut state = self.inner.state.lock().expect("memory cluster lock poisoned");
        state.injected.extend(errors);
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_connects(&self, n: u32) {
        self.inner.connect_failures.store(n, Ordering::SeqCst);
    }

    pub fn node_exists(&self, path: &str) -> bool {
        let state = self.inner.state.lock().expect("memory cluster lock poisoned");
        state.tree.contains_key(path)
    }

    pub fn data_of(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.inner.state.lock().expect("memory cluster lock poisoned");
        state.tree.get(path).map(|node| node.data.clone())
    }

    pub fn children_of(&self, path: &str) -> Vec<String> {
        let state = self.inner.state.lock().expect("memory cluster lock poisoned");
        children_of(&state.tree, path)
    }

    /// Seed a node directly, bypassing the session path. Test hook.
    pub fn put_node(&self, path: &str, data: &[u8]) {
        let mut state = self.inner.state.lock().expect("memory cluster lock poisoned");
        state.tree.insert(
            path.to_string(),
            NodeRecord {
                data: data.to_vec(),
                version: 0,
            },
        );
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => "/",
    }
}

fn children_of(tree: &BTreeMap<String, NodeRecord>, path: &str) -> Vec<String> {
    let prefix = if path == "/" {
        "/".to_string()
    } else {
        format!("{path}/")
    };
    tree.range(prefix.clone()..)
        .take_while(|(p, _)| p.starts_with(&prefix))
        .filter_map(|(p, _)| {
            let rest = &p[prefix.len()..];
            (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
        })
        .collect()
}

fn apply_create(
    tree: &mut BTreeMap<String, NodeRecord>,
    path: &str,
    data: &[u8],
) -> ZkResult<()> {
    if tree.contains_key(path) {
        return Err(ZkError::NodeExists(path.to_string()));
    }
    let parent = parent_of(path);
    if parent != "/" && !tree.contains_key(parent) {
        return Err(ZkError::NoNode(parent.to_string()));
    }
    tree.insert(
        path.to_string(),
        NodeRecord {
            data: data.to_vec(),
            version: 0,
        },
    );
    Ok(())
}

fn apply_delete(
    tree: &mut BTreeMap<String, NodeRecord>,
    path: &str,
    version: Option<i64>,
) -> ZkResult<()> {
    let node = tree
        .get(path)
        .ok_or_else(|| ZkError::NoNode(path.to_string()))?;
    if let Some(expected) = version {
        if node.version != expected {
            return Err(ZkError::BadVersion(path.to_string()));
        }
    }
    tree.remove(path);
    Ok(())
}

struct MemoryConnector {
    inner: Arc<Inner>,
}

#[async_trait]
impl ZkConnector for MemoryConnector {
    async fn connect(
        &self,
        address: &str,
        _session_timeout: Duration,
    ) -> ZkResult<Arc<dyn ZkHandle>> {
        let remaining = self.inner.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner
                .connect_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ZkError::Connect(format!(
                "simulated connect failure to {address}"
            )));
        }
        Ok(Arc::new(MemoryHandle {
            inner: self.inner.clone(),
            open: AtomicBool::new(true),
        }))
    }
}

struct MemoryHandle {
    inner: Arc<Inner>,
    open: AtomicBool,
}

impl MemoryHandle {
    fn check_open(&self) -> ZkResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ZkError::ConnectionLoss)
        }
    }

    fn take_injected(&self) -> Option<ZkError> {
        let mut state = self.inner.state.lock().expect("memory cluster lock poisoned");
        state.injected.pop_front()
    }
}

#[async_trait]
impl ZkHandle for MemoryHandle {
    async fn create(&self, path: &str, data: &[u8], _acl: &[Acl]) -> ZkResult<String> {
        self.check_open()?;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let mut state = self.inner.state.lock().expect("memory cluster lock poisoned");
        apply_create(&mut state.tree, path, data)?;
        Ok(path.to_string())
    }

    async fn delete(&self, path: &str, version: Option<i64>) -> ZkResult<()> {
        self.check_open()?;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let mut state = self.inner.state.lock().expect("memory cluster lock poisoned");
        apply_delete(&mut state.tree, path, version)
    }

    async fn get_data(&self, path: &str) -> ZkResult<Vec<u8>> {
        self.check_open()?;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let state = self.inner.state.lock().expect("memory cluster lock poisoned");
        state
            .tree
            .get(path)
            .map(|node| node.data.clone())
            .ok_or_else(|| ZkError::NoNode(path.to_string()))
    }

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i64>) -> ZkResult<()> {
        self.check_open()?;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let mut state = self.inner.state.lock().expect("memory cluster lock poisoned");
        let node = state
            .tree
            .get_mut(path)
            .ok_or_else(|| ZkError::NoNode(path.to_string()))?;
        if let Some(expected) = version {
            if node.version != expected {
                return Err(ZkError::BadVersion(path.to_string()));
            }
        }
        node.data = data.to_vec();
        node.version += 1;
        Ok(())
    }

    async fn get_children(&self, path: &str) -> ZkResult<Vec<String>> {
        self.check_open()?;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let state = self.inner.state.lock().expect("memory cluster lock poisoned");
        if path != "/" && !state.tree.contains_key(path) {
            return Err(ZkError::NoNode(path.to_string()));
        }
        Ok(children_of(&state.tree, path))
    }

    async fn multi(&self, ops: &[MultiOp]) -> ZkResult<()> {
        self.check_open()?;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let mut state = self.inner.state.lock().expect("memory cluster lock poisoned");
        // Validate against a scratch copy, commit only a fully applied batch.
        let mut scratch = state.tree.clone();
        for op in ops {
            match op {
                MultiOp::Create { path, data, .. } => apply_create(&mut scratch, path, data)?,
                MultiOp::Delete { path, version } => apply_delete(&mut scratch, path, *version)?,
            }
        }
        state.tree = scratch;
        Ok(())
    }

    async fn exists(&self, path: &str) -> ZkResult<bool> {
        self.check_open()?;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let state = self.inner.state.lock().expect("memory cluster lock poisoned");
        Ok(state.tree.contains_key(path))
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
