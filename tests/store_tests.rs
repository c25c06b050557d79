//! Persister and loader scenarios against the in-process coordination
//! service.
//!
//! Run with: cargo test --test store_tests

use rmstore::codec::{ApplicationStateData, AttemptStateData};
use rmstore::store::paths::StorePaths;
use rmstore::zk::memory::MemoryCluster;
use rmstore::{
    ApplicationAttemptId, ApplicationId, ApplicationState, AttemptState, DelegationKey,
    DelegationTokenId, StoreConfig, StoreError, ZkStateStore,
};
use std::time::Duration;

async fn started_store(cluster: &MemoryCluster) -> ZkStateStore {
    let config = StoreConfig::new("memory:2181")
        .session_timeout(Duration::from_millis(500))
        .num_retries(3);
    let store = ZkStateStore::new(config, cluster.connector()).unwrap();
    store.start().await.unwrap();
    store
}

fn app_blob(app_id: &ApplicationId, user: &str, submit_time: u64) -> Vec<u8> {
    ApplicationStateData {
        app_id: app_id.to_string(),
        submit_time,
        user: user.to_string(),
        submission_context: b"submission-context".to_vec(),
    }
    .to_bytes()
    .unwrap()
}

fn attempt_blob(attempt_id: &ApplicationAttemptId) -> Vec<u8> {
    AttemptStateData {
        attempt_id: attempt_id.to_string(),
        master_container: b"master-container".to_vec(),
        attempt_tokens: None,
    }
    .to_bytes()
    .unwrap()
}

fn token(sequence_number: u64) -> DelegationTokenId {
    DelegationTokenId::new(sequence_number, format!("token-{sequence_number}").into_bytes())
}

#[tokio::test]
async fn test_store_and_load_application_with_attempt() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let app_id = ApplicationId::new(1, 1);
    let attempt_id = ApplicationAttemptId::new(app_id, 1);
    store
        .store_application(&app_id, &app_blob(&app_id, "alice", 1000))
        .await
        .unwrap();
    store
        .store_application_attempt(&attempt_id, &attempt_blob(&attempt_id))
        .await
        .unwrap();

    let recovered = store.load().await.unwrap();
    assert_eq!(recovered.applications.len(), 1);

    let app = &recovered.applications[&app_id];
    assert_eq!(app.app_id, app_id);
    assert_eq!(app.user, "alice");
    assert_eq!(app.submit_time, 1000);
    assert_eq!(app.submission_context, b"submission-context");
    assert_eq!(app.attempts.len(), 1);

    let attempt = &app.attempts[&attempt_id];
    assert_eq!(attempt.attempt_id, attempt_id);
    assert_eq!(attempt.master_container, b"master-container");
    assert!(attempt.attempt_tokens.is_none());
}

#[tokio::test]
async fn test_duplicate_application_store_fails() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let app_id = ApplicationId::new(1, 1);
    let blob = app_blob(&app_id, "alice", 1000);
    store.store_application(&app_id, &blob).await.unwrap();

    let err = store.store_application(&app_id, &blob).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyStored(_)));
}

#[tokio::test]
async fn test_remove_application_removes_all_attempts() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let app_id = ApplicationId::new(1, 1);
    let attempt_1 = ApplicationAttemptId::new(app_id, 1);
    let attempt_2 = ApplicationAttemptId::new(app_id, 2);
    store
        .store_application(&app_id, &app_blob(&app_id, "alice", 1000))
        .await
        .unwrap();
    store
        .store_application_attempt(&attempt_1, &attempt_blob(&attempt_1))
        .await
        .unwrap();
    store
        .store_application_attempt(&attempt_2, &attempt_blob(&attempt_2))
        .await
        .unwrap();

    let recovered = store.load().await.unwrap();
    store
        .remove_application(&recovered.applications[&app_id])
        .await
        .unwrap();

    let paths = StorePaths::new("/rmstore");
    assert!(!cluster.node_exists(&paths.app_node(&app_id.to_string())));
    assert!(!cluster.node_exists(&paths.app_node(&attempt_1.to_string())));
    assert!(!cluster.node_exists(&paths.app_node(&attempt_2.to_string())));
    assert!(store.load().await.unwrap().applications.is_empty());
}

#[tokio::test]
async fn test_failed_removal_leaves_all_nodes() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let app_id = ApplicationId::new(1, 1);
    let attempt_1 = ApplicationAttemptId::new(app_id, 1);
    store
        .store_application(&app_id, &app_blob(&app_id, "alice", 1000))
        .await
        .unwrap();
    store
        .store_application_attempt(&attempt_1, &attempt_blob(&attempt_1))
        .await
        .unwrap();

    // Ask for removal of an attempt node that was never persisted; the whole
    // transaction must fail and remove nothing.
    let phantom = ApplicationAttemptId::new(app_id, 9);
    let mut app = ApplicationState::new(app_id, 1000, "alice".to_string(), Vec::new());
    for attempt_id in [attempt_1, phantom] {
        app.attempts.insert(
            attempt_id,
            AttemptState {
                attempt_id,
                master_container: Vec::new(),
                attempt_tokens: None,
            },
        );
    }
    assert!(store.remove_application(&app).await.is_err());

    let paths = StorePaths::new("/rmstore");
    assert!(cluster.node_exists(&paths.app_node(&app_id.to_string())));
    assert!(cluster.node_exists(&paths.app_node(&attempt_1.to_string())));

    let recovered = store.load().await.unwrap();
    assert_eq!(recovered.applications[&app_id].attempts.len(), 1);
}

#[tokio::test]
async fn test_delegation_key_lifecycle() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let key = DelegationKey::new(5, 99_000, vec![7; 16]);
    store.store_delegation_key(&key).await.unwrap();
    assert!(
        store
            .load()
            .await
            .unwrap()
            .secret_manager_state
            .master_keys
            .contains(&key)
    );

    store.remove_delegation_key(&key).await.unwrap();
    let recovered = store.load().await.unwrap();
    assert!(recovered.secret_manager_state.master_keys.is_empty());
}

#[tokio::test]
async fn test_sequence_marker_is_unique_and_latest() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    for seq in 1..=3u64 {
        store
            .store_delegation_token_and_sequence_number(&token(seq), 10_000 + seq, seq)
            .await
            .unwrap();
    }

    let paths = StorePaths::new("/rmstore");
    let markers: Vec<String> = cluster
        .children_of(&paths.secret_root)
        .into_iter()
        .filter(|name| name.starts_with("RMDTSequenceNumber_"))
        .collect();
    assert_eq!(markers, vec!["RMDTSequenceNumber_3".to_string()]);

    let recovered = store.load().await.unwrap();
    assert_eq!(recovered.secret_manager_state.dt_sequence_number, 3);
    assert_eq!(recovered.secret_manager_state.delegation_tokens.len(), 3);
    assert_eq!(
        recovered.secret_manager_state.delegation_tokens[&token(2)],
        10_002
    );
}

#[tokio::test]
async fn test_remove_delegation_token() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    store
        .store_delegation_token_and_sequence_number(&token(1), 10_000, 1)
        .await
        .unwrap();
    store.remove_delegation_token(&token(1)).await.unwrap();

    let recovered = store.load().await.unwrap();
    assert!(recovered.secret_manager_state.delegation_tokens.is_empty());
    // The marker is untouched by token removal.
    assert_eq!(recovered.secret_manager_state.dt_sequence_number, 1);
}

#[tokio::test]
async fn test_orphan_attempt_is_repaired_on_load() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let attempt_id = ApplicationAttemptId::new(ApplicationId::new(1, 1), 1);
    store
        .store_application_attempt(&attempt_id, &attempt_blob(&attempt_id))
        .await
        .unwrap();

    let recovered = store.load().await.unwrap();
    assert!(recovered.applications.is_empty());

    // The orphan node was deleted during load, not merely hidden.
    let paths = StorePaths::new("/rmstore");
    assert!(!cluster.node_exists(&paths.app_node(&attempt_id.to_string())));
}

#[tokio::test]
async fn test_load_skips_unknown_nodes() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let app_id = ApplicationId::new(1, 1);
    store
        .store_application(&app_id, &app_blob(&app_id, "alice", 1000))
        .await
        .unwrap();

    let paths = StorePaths::new("/rmstore");
    cluster.put_node(&paths.app_node("FutureNodeKind_1"), b"whatever");
    cluster.put_node(&paths.secret_node("FutureSecret_1"), b"whatever");

    let recovered = store.load().await.unwrap();
    assert_eq!(recovered.applications.len(), 1);
    assert!(recovered.secret_manager_state.master_keys.is_empty());
    assert!(recovered.secret_manager_state.delegation_tokens.is_empty());
}

#[tokio::test]
async fn test_mismatched_application_id_fails_load() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let stored_as = ApplicationId::new(1, 1);
    let embedded = ApplicationId::new(1, 2);
    let paths = StorePaths::new("/rmstore");
    cluster.put_node(
        &paths.app_node(&stored_as.to_string()),
        &app_blob(&embedded, "alice", 1000),
    );

    let err = store.load().await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[tokio::test]
async fn test_load_replays_net_effect() -> anyhow::Result<()> {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    let kept = ApplicationId::new(1, 1);
    let removed = ApplicationId::new(1, 2);
    store
        .store_application(&kept, &app_blob(&kept, "alice", 1000))
        .await?;
    store
        .store_application(&removed, &app_blob(&removed, "bob", 2000))
        .await?;
    store
        .remove_application(&ApplicationState::new(
            removed,
            2000,
            "bob".to_string(),
            Vec::new(),
        ))
        .await?;

    let key_kept = DelegationKey::new(1, 50_000, vec![1; 8]);
    let key_removed = DelegationKey::new(2, 60_000, vec![2; 8]);
    store.store_delegation_key(&key_kept).await?;
    store.store_delegation_key(&key_removed).await?;
    store.remove_delegation_key(&key_removed).await?;

    store
        .store_delegation_token_and_sequence_number(&token(1), 10_000, 1)
        .await?;

    let recovered = store.load().await?;
    assert_eq!(
        recovered.applications.keys().copied().collect::<Vec<_>>(),
        vec![kept]
    );
    assert_eq!(recovered.applications[&kept].user, "alice");
    assert_eq!(
        recovered.secret_manager_state.master_keys,
        [key_kept].into_iter().collect::<std::collections::HashSet<_>>()
    );
    assert_eq!(recovered.secret_manager_state.delegation_tokens.len(), 1);
    assert_eq!(recovered.secret_manager_state.dt_sequence_number, 1);
    Ok(())
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let cluster = MemoryCluster::new();
    let store = started_store(&cluster).await;

    // A second bootstrap against the same namespace tolerates the existing
    // roots.
    store.start().await.unwrap();
    let other = started_store(&cluster).await;
    assert!(other.load().await.unwrap().applications.is_empty());
}
