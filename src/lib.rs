// ============================================================================
// rmstore Library
// ============================================================================
//! Durable recovery store for a cluster resource manager, backed by a
//! ZooKeeper-class coordination service.
//!
//! The store is the authoritative record of submitted applications, their
//! execution attempts, and delegation-token secret manager state. It owns
//! one session to the coordination service, retries transient failures with
//! a bounded discipline, persists every entity as one node in a fixed
//! namespace, and reconstructs a consistent in-memory snapshot on startup —
//! including repairing orphaned attempt nodes left by a prior crash.

pub mod codec;
pub mod config;
pub mod core;
pub mod store;
pub mod zk;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use core::{
    ApplicationAttemptId, ApplicationId, ApplicationState, AttemptState, DelegationKey,
    DelegationTokenId, RecoveredState, Result, SecretManagerState, StoreError,
};
pub use store::ZkStateStore;
pub use zk::{Acl, MultiOp, Perms, SessionEvent, ZkConnector, ZkError, ZkHandle};
