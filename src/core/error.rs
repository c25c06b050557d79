use crate::zk::ZkError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Untranslated failure code from the coordination service. Anything the
    /// store does not tolerate or remap propagates through this variant.
    #[error("coordination service error: {0}")]
    Coordination(#[from] ZkError),

    #[error("entity already stored at '{0}'")]
    AlreadyStored(String),

    #[error("unable to connect to coordination service at '{0}'")]
    Unavailable(String),

    #[error("timed out after {0:?} waiting for a live session")]
    SessionWaitTimeout(Duration),

    #[error("corrupt state: {0}")]
    Corrupt(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
