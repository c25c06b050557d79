use super::ids::{ApplicationAttemptId, ApplicationId};
use std::collections::{HashMap, HashSet};

/// Full recovered state of the resource manager, reconstructed once per load.
#[derive(Debug, Default)]
pub struct RecoveredState {
    pub applications: HashMap<ApplicationId, ApplicationState>,
    pub secret_manager_state: SecretManagerState,
}

/// Persisted state of a single application and its attempts.
#[derive(Debug, Clone)]
pub struct ApplicationState {
    pub app_id: ApplicationId,
    pub submit_time: u64,
    pub user: String,
    /// Opaque pre-serialized submission context.
    pub submission_context: Vec<u8>,
    pub attempts: HashMap<ApplicationAttemptId, AttemptState>,
}

impl ApplicationState {
    pub fn new(
        app_id: ApplicationId,
        submit_time: u64,
        user: String,
        submission_context: Vec<u8>,
    ) -> Self {
        Self {
            app_id,
            submit_time,
            user,
            submission_context,
            attempts: HashMap::new(),
        }
    }
}

/// Persisted state of one execution attempt.
#[derive(Debug, Clone)]
pub struct AttemptState {
    pub attempt_id: ApplicationAttemptId,
    /// Opaque descriptor of the attempt's master container.
    pub master_container: Vec<u8>,
    /// Credential bundle, present only if one was recorded at persist time.
    pub attempt_tokens: Option<Vec<u8>>,
}

/// Recovered delegation-token secret manager state.
#[derive(Debug, Default)]
pub struct SecretManagerState {
    pub dt_sequence_number: u64,
    pub master_keys: HashSet<DelegationKey>,
    pub delegation_tokens: HashMap<DelegationTokenId, u64>,
}

/// Master key of the delegation-token secret manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegationKey {
    pub key_id: i32,
    pub expiry_date: u64,
    pub key: Vec<u8>,
}

impl DelegationKey {
    pub fn new(key_id: i32, expiry_date: u64, key: Vec<u8>) -> Self {
        Self {
            key_id,
            expiry_date,
            key,
        }
    }
}

/// Identifier of a delegation token.
///
/// The sequence number names the token's node; the identifier bytes are the
/// opaque serialized form owned by the secret manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegationTokenId {
    pub sequence_number: u64,
    pub identifier: Vec<u8>,
}

impl DelegationTokenId {
    pub fn new(sequence_number: u64, identifier: Vec<u8>) -> Self {
        Self {
            sequence_number,
            identifier,
        }
    }
}
