//! Fixed-format read/write contracts for the payloads the store persists.
//!
//! The store itself treats application and attempt payloads as opaque blobs;
//! these are the companion contracts the resource-manager side encodes with
//! and the loader decodes with. Application and attempt payloads use compact
//! MessagePack; delegation keys and token nodes use fixed big-endian layouts.

use crate::core::{DelegationKey, Result, StoreError};
use serde::{Deserialize, Serialize};

/// Serialized form of an application's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationStateData {
    /// Rendered application id, matched against the node name on load.
    pub app_id: String,
    pub submit_time: u64,
    pub user: String,
    pub submission_context: Vec<u8>,
}

impl ApplicationStateData {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| StoreError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

/// Serialized form of an attempt's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptStateData {
    /// Rendered attempt id, matched against the node name on load.
    pub attempt_id: String,
    pub master_container: Vec<u8>,
    pub attempt_tokens: Option<Vec<u8>>,
}

impl AttemptStateData {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| StoreError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

/// Delegation-key node layout: `i32 key_id ‖ u64 expiry ‖ u32 len ‖ key bytes`,
/// all big-endian.
pub fn encode_delegation_key(key: &DelegationKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + key.key.len());
    out.extend_from_slice(&key.key_id.to_be_bytes());
    out.extend_from_slice(&key.expiry_date.to_be_bytes());
    out.extend_from_slice(&(key.key.len() as u32).to_be_bytes());
    out.extend_from_slice(&key.key);
    out
}

pub fn decode_delegation_key(bytes: &[u8]) -> Result<DelegationKey> {
    if bytes.len() < 16 {
        return Err(StoreError::Codec(format!(
            "delegation key node truncated at {} bytes",
            bytes.len()
        )));
    }
    let key_id = i32::from_be_bytes(bytes[0..4].try_into().unwrap());
    let expiry_date = u64::from_be_bytes(bytes[4..12].try_into().unwrap());
    let len = u32::from_be_bytes(bytes[12..16].try_into().unwrap()) as usize;
    if bytes.len() != 16 + len {
        return Err(StoreError::Codec(format!(
            "delegation key material length {} does not match node size {}",
            len,
            bytes.len()
        )));
    }
    Ok(DelegationKey::new(key_id, expiry_date, bytes[16..].to_vec()))
}

/// Token node layout: the opaque identifier bytes followed by a trailing
/// big-endian u64 renewal deadline.
pub fn encode_token_node(identifier: &[u8], renew_date: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(identifier.len() + 8);
    out.extend_from_slice(identifier);
    out.extend_from_slice(&renew_date.to_be_bytes());
    out
}

pub fn decode_token_node(bytes: &[u8]) -> Result<(Vec<u8>, u64)> {
    if bytes.len() < 8 {
        return Err(StoreError::Codec(format!(
            "token node truncated at {} bytes",
            bytes.len()
        )));
    }
    let split = bytes.len() - 8;
    let renew_date = u64::from_be_bytes(bytes[split..].try_into().unwrap());
    Ok((bytes[..split].to_vec(), renew_date))
}
