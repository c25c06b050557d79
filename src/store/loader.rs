//! Full-namespace scan and in-memory state reconstruction.
//!
//! Children are listed in arbitrary order, so attempts are buffered and
//! linked to their applications only after the full scan. An attempt whose
//! application node is gone (a crash mid-removal leaves those behind) is
//! deleted best-effort and never surfaced.

use super::paths::{
    DELEGATION_KEY_PREFIX, DELEGATION_TOKEN_PREFIX, DT_SEQUENCE_NUMBER_PREFIX, StorePaths,
};
use super::retry::RetryExecutor;
use crate::codec::{self, ApplicationStateData, AttemptStateData};
use crate::core::{
    APP_ATTEMPT_PREFIX, APPLICATION_PREFIX, ApplicationAttemptId, ApplicationId, ApplicationState,
    AttemptState, DelegationKey, DelegationTokenId, RecoveredState, Result, StoreError,
};
use tracing::{debug, info, warn};

pub(crate) async fn load_state(
    exec: &RetryExecutor,
    paths: &StorePaths,
) -> Result<RecoveredState> {
    let mut state = RecoveredState::default();
    load_secret_manager_state(exec, paths, &mut state).await?;
    load_app_state(exec, paths, &mut state).await?;
    Ok(state)
}

async fn load_secret_manager_state(
    exec: &RetryExecutor,
    paths: &StorePaths,
    state: &mut RecoveredState,
) -> Result<()> {
    let secret = &mut state.secret_manager_state;
    for name in exec.get_children(&paths.secret_root).await? {
        if name.starts_with(DT_SEQUENCE_NUMBER_PREFIX) {
            // Marker nodes carry their value in the name; no data to fetch.
            secret.dt_sequence_number =
                StorePaths::parse_sequence_number(&name).ok_or_else(|| {
                    StoreError::Corrupt(format!("malformed sequence marker node '{name}'"))
                })?;
            continue;
        }

        let data = exec.get_data(&paths.secret_node(&name)).await?;
        if name.starts_with(DELEGATION_KEY_PREFIX) {
            let key: DelegationKey = codec::decode_delegation_key(&data)?;
            debug!(node = %name, key_id = key.key_id, "loaded delegation master key");
            secret.master_keys.insert(key);
        } else if let Some(suffix) = name.strip_prefix(DELEGATION_TOKEN_PREFIX) {
            let sequence_number = suffix.parse().map_err(|_| {
                StoreError::Corrupt(format!("malformed delegation token node '{name}'"))
            })?;
            let (identifier, renew_date) = codec::decode_token_node(&data)?;
            debug!(node = %name, renew_date, "loaded delegation token");
            secret
                .delegation_tokens
                .insert(DelegationTokenId::new(sequence_number, identifier), renew_date);
        } else {
            info!(node = %name, "unknown secret manager child node, skipping");
        }
    }
    Ok(())
}

async fn load_app_state(
    exec: &RetryExecutor,
    paths: &StorePaths,
    state: &mut RecoveredState,
) -> Result<()> {
    let mut attempts: Vec<AttemptState> = Vec::new();

    for name in exec.get_children(&paths.app_root).await? {
        let data = exec.get_data(&paths.app_node(&name)).await?;
        if name.starts_with(APPLICATION_PREFIX) {
            info!(node = %name, "loading application");
            let app_id: ApplicationId = name
                .parse()
                .map_err(|err| StoreError::Corrupt(format!("{err}")))?;
            let decoded = ApplicationStateData::from_bytes(&data)?;
            if decoded.app_id != name {
                return Err(StoreError::Corrupt(format!(
                    "node '{name}' does not match embedded application id '{}'",
                    decoded.app_id
                )));
            }
            state.applications.insert(
                app_id,
                ApplicationState::new(
                    app_id,
                    decoded.submit_time,
                    decoded.user,
                    decoded.submission_context,
                ),
            );
        } else if name.starts_with(APP_ATTEMPT_PREFIX) {
            info!(node = %name, "loading application attempt");
            let attempt_id: ApplicationAttemptId = name
                .parse()
                .map_err(|err| StoreError::Corrupt(format!("{err}")))?;
            let decoded = AttemptStateData::from_bytes(&data)?;
            if decoded.attempt_id != name {
                return Err(StoreError::Corrupt(format!(
                    "node '{name}' does not match embedded attempt id '{}'",
                    decoded.attempt_id
                )));
            }
            attempts.push(AttemptState {
                attempt_id,
                master_container: decoded.master_container,
                attempt_tokens: decoded.attempt_tokens,
            });
        } else {
            info!(node = %name, "unknown application root child node, skipping");
        }
    }

    // Linking pass: children may be listed before or after their parents.
    for attempt in attempts {
        match state.applications.get_mut(&attempt.attempt_id.app_id()) {
            Some(app) => {
                app.attempts.insert(attempt.attempt_id, attempt);
            }
            None => {
                // The application node was removed but the manager stopped
                // before its attempt nodes went with it.
                warn!(attempt_id = %attempt.attempt_id, "application node not found for attempt, deleting orphan");
                let path = paths.app_node(&attempt.attempt_id.to_string());
                if let Err(err) = exec.delete(&path, None).await {
                    warn!(error = %err, path = %path, "failed to delete orphaned attempt node");
                }
            }
        }
    }
    Ok(())
}
