//! Seam between the store and the coordination service.
//!
//! The store never talks to a concrete client library; it consumes the
//! service through the [`ZkConnector`] / [`ZkHandle`] traits and receives
//! session-level notifications as [`SessionEvent`] values. Production
//! connectors register a watcher with their client and forward its session
//! events to `ZkStateStore::process_session_event`; the store makes no
//! assumption about which thread or task delivers them.

pub mod memory;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure codes of the coordination service, kept close to the wire codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZkError {
    #[error("connection to the coordination service was lost")]
    ConnectionLoss,

    #[error("coordination operation timed out")]
    OperationTimeout,

    #[error("node already exists: '{0}'")]
    NodeExists(String),

    #[error("node not found: '{0}'")]
    NoNode(String),

    #[error("version mismatch on '{0}'")]
    BadVersion(String),

    #[error("session expired")]
    SessionExpired,

    #[error("connect failed: {0}")]
    Connect(String),
}

impl ZkError {
    /// Transient codes are retried by the executor; everything else
    /// propagates to the caller uninterpreted.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLoss | Self::OperationTimeout)
    }
}

pub type ZkResult<T> = std::result::Result<T, ZkError>;

/// Permission bits attached to a node ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perms(u8);

impl Perms {
    pub const READ: Perms = Perms(0b00001);
    pub const WRITE: Perms = Perms(0b00010);
    pub const CREATE: Perms = Perms(0b00100);
    pub const DELETE: Perms = Perms(0b01000);
    pub const ADMIN: Perms = Perms(0b10000);
    pub const ALL: Perms = Perms(0b11111);

    pub fn contains(&self, other: Perms) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parse a permission spec such as `rwcda` or `rw`.
    pub fn from_spec(spec: &str) -> Result<Self, String> {
        let mut perms = 0u8;
        for ch in spec.chars() {
            perms |= match ch {
                'r' => Self::READ.0,
                'w' => Self::WRITE.0,
                'c' => Self::CREATE.0,
                'd' => Self::DELETE.0,
                'a' => Self::ADMIN.0,
                other => return Err(format!("invalid permission character '{other}'")),
            };
        }
        Ok(Perms(perms))
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, ch) in [
            (Self::READ, 'r'),
            (Self::WRITE, 'w'),
            (Self::CREATE, 'c'),
            (Self::DELETE, 'd'),
            (Self::ADMIN, 'a'),
        ] {
            if self.contains(bit) {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// One access-control entry applied at node creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub scheme: String,
    pub id: String,
    pub perms: Perms,
}

impl Acl {
    pub fn new(scheme: &str, id: &str, perms: Perms) -> Self {
        Self {
            scheme: scheme.to_string(),
            id: id.to_string(),
            perms,
        }
    }

    /// The open ACL: anyone may do anything.
    pub fn world_anyone() -> Self {
        Self::new("world", "anyone", Perms::ALL)
    }
}

/// Parse a comma-separated ACL spec, entries shaped `scheme:id:perms`.
/// Ids may themselves contain `:` (digest credentials), so the perms field is
/// taken from the last colon.
pub fn parse_acls(spec: &str) -> Result<Vec<Acl>, String> {
    let mut acls = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (scheme, rest) = entry
            .split_once(':')
            .ok_or_else(|| format!("invalid ACL entry '{entry}'"))?;
        let (id, perms) = rest
            .rsplit_once(':')
            .ok_or_else(|| format!("invalid ACL entry '{entry}'"))?;
        acls.push(Acl::new(scheme, id, Perms::from_spec(perms)?));
    }
    if acls.is_empty() {
        return Err("empty ACL spec".to_string());
    }
    Ok(acls)
}

/// Session-level connectivity notifications delivered by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Expired,
}

/// One member of an atomic multi-operation batch.
#[derive(Debug, Clone)]
pub enum MultiOp {
    Create {
        path: String,
        data: Vec<u8>,
        acl: Vec<Acl>,
    },
    Delete {
        path: String,
        /// `None` deletes unconditionally.
        version: Option<i64>,
    },
}

/// A live session handle. All primitives are idempotent at the protocol
/// level; retrying after a connection loss is the executor's job, not the
/// handle's.
#[async_trait]
pub trait ZkHandle: Send + Sync {
    async fn create(&self, path: &str, data: &[u8], acl: &[Acl]) -> ZkResult<String>;

    /// Delete a node. `version: None` is unconditional.
    async fn delete(&self, path: &str, version: Option<i64>) -> ZkResult<()>;

    async fn get_data(&self, path: &str) -> ZkResult<Vec<u8>>;

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i64>) -> ZkResult<()>;

    /// Names (not paths) of the direct children of `path`.
    async fn get_children(&self, path: &str) -> ZkResult<Vec<String>>;

    /// Apply a batch atomically: either every op applies or none does.
    async fn multi(&self, ops: &[MultiOp]) -> ZkResult<()>;

    async fn exists(&self, path: &str) -> ZkResult<bool>;

    async fn close(&self);
}

impl std::fmt::Debug for dyn ZkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ZkHandle")
    }
}

/// Opens sessions against the coordination service.
#[async_trait]
pub trait ZkConnector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        session_timeout: Duration,
    ) -> ZkResult<Arc<dyn ZkHandle>>;
}
