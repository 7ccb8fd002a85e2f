//! End-to-end tests for the admission registry.
//!
//! Run with: cargo test --package querygate-admission --test registry_tests

use bytes::Bytes;
use querygate_admission::{
    AdmissionError, AdmissionRegistry, LogSink, MemoryStore, QueryKind, QueryStatus, QueryStore,
    ResolutionAction, PEER_RESOLVER,
};
use querygate_audit::AuditLogger;
use querygate_core::ApprovalConfig;
use std::sync::mpsc;
use std::sync::Arc;

/// What a resolution callback delivered.
#[derive(Debug, PartialEq)]
enum Delivered {
    Forwarded(Bytes),
    Rejected(String),
}

fn registry(peer_enabled: bool, min_votes: usize) -> (AdmissionRegistry, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let registry = AdmissionRegistry::new(
        store.clone(),
        Arc::new(LogSink),
        Arc::new(AuditLogger::disabled()),
        ApprovalConfig {
            peer_enabled,
            min_votes,
        },
    );
    (registry, store)
}

/// Register a query whose callbacks report into an mpsc channel.
async fn register_probe(
    registry: &AdmissionRegistry,
    conn_id: &str,
    sql: &str,
) -> (i64, mpsc::Receiver<Delivered>) {
    let (tx, rx) = mpsc::channel();
    let forward_tx = tx.clone();
    let id = registry
        .register(
            conn_id,
            QueryKind::Simple,
            sql,
            Bytes::from(sql.as_bytes().to_vec()),
            Box::new(move |bytes| {
                let _ = forward_tx.send(Delivered::Forwarded(bytes));
            }),
            Box::new(move |reason| {
                let _ = tx.send(Delivered::Rejected(reason));
            }),
        )
        .await
        .unwrap();
    (id, rx)
}

#[tokio::test]
async fn test_approve_forwards_original_bytes() {
    let (registry, store) = registry(false, 2);
    let (id, rx) = register_probe(&registry, "conn-1", "DROP TABLE users;").await;
    assert_eq!(id, 1);

    registry.approve(id, "admin").await.unwrap();

    assert_eq!(
        rx.try_recv().unwrap(),
        Delivered::Forwarded(Bytes::from_static(b"DROP TABLE users;"))
    );
    assert!(rx.try_recv().is_err(), "callback must fire exactly once");

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, QueryStatus::Approved);
    assert_eq!(record.resolved_by.as_deref(), Some("admin"));
    assert!(registry.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reject_delivers_reason_not_bytes() {
    let (registry, store) = registry(false, 2);
    let (id, rx) = register_probe(&registry, "conn-1", "TRUNCATE audit_log").await;

    registry.reject(id, "dba").await.unwrap();

    assert_eq!(
        rx.try_recv().unwrap(),
        Delivered::Rejected("Query rejected by dba".to_string())
    );
    assert!(rx.try_recv().is_err());

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, QueryStatus::Rejected);
}

#[tokio::test]
async fn test_terminal_status_reached_at_most_once() {
    let (registry, _) = registry(false, 2);
    let (id, rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    registry.approve(id, "admin").await.unwrap();

    // Every later resolution attempt fails without touching the callbacks.
    assert!(matches!(
        registry.approve(id, "admin").await,
        Err(AdmissionError::NotFound)
    ));
    assert!(matches!(
        registry.reject(id, "admin").await,
        Err(AdmissionError::NotFound)
    ));

    let delivered: Vec<Delivered> = rx.try_iter().collect();
    assert_eq!(delivered.len(), 1);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let (registry, _) = registry(false, 2);
    assert!(matches!(
        registry.approve(999, "admin").await,
        Err(AdmissionError::NotFound)
    ));
    assert!(matches!(
        registry.vote_status(999).await,
        Err(AdmissionError::NotFound)
    ));
}

#[tokio::test]
async fn test_vote_requires_peer_approval() {
    let (registry, _) = registry(false, 2);
    let (id, _rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    assert!(matches!(
        registry.vote(id, "alice", "APPROVE").await,
        Err(AdmissionError::InvalidState)
    ));
}

#[tokio::test]
async fn test_vote_unknown_choice_is_invalid_input() {
    let (registry, _) = registry(true, 2);
    let (id, _rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    assert!(matches!(
        registry.vote(id, "alice", "MAYBE").await,
        Err(AdmissionError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_duplicate_vote_is_noop() {
    let (registry, store) = registry(true, 3);
    let (id, _rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    let first = registry.vote(id, "alice", "APPROVE").await.unwrap();
    assert_eq!(first.approval_count, 1);

    let second = registry.vote(id, "alice", "APPROVE").await.unwrap();
    assert_eq!(second.approval_count, 1);
    assert_eq!(second.rejection_count, 0);
    assert!(!second.auto_resolved);

    // Only one persisted vote row.
    assert_eq!(store.votes(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_changed_vote_moves_one_unit() {
    let (registry, store) = registry(true, 3);
    let (id, _rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    registry.vote(id, "alice", "APPROVE").await.unwrap();
    let flipped = registry.vote(id, "alice", "REJECT").await.unwrap();

    assert_eq!(flipped.approval_count, 0);
    assert_eq!(flipped.rejection_count, 1);

    // Still a single row, now mutated.
    let votes = store.votes(id).await.unwrap();
    assert_eq!(votes.len(), 1);

    let status = registry.vote_status(id).await.unwrap();
    assert_eq!(status.approvals, Vec::<String>::new());
    assert_eq!(status.rejections, vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_quorum_auto_approves_exactly_once() {
    let (registry, store) = registry(true, 2);
    let (id, rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    let first = registry.vote(id, "alice", "APPROVE").await.unwrap();
    assert!(!first.auto_resolved);

    let second = registry.vote(id, "bob", "APPROVE").await.unwrap();
    assert!(second.auto_resolved);
    assert_eq!(second.action, Some(ResolutionAction::Approved));
    assert_eq!(second.approval_count, 2);

    assert!(matches!(
        rx.try_recv().unwrap(),
        Delivered::Forwarded(_)
    ));

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, QueryStatus::Approved);
    assert_eq!(record.resolved_by.as_deref(), Some(PEER_RESOLVER));

    // A further vote is a no-op: the query is no longer pending.
    assert!(matches!(
        registry.vote(id, "carol", "APPROVE").await,
        Err(AdmissionError::NotFound)
    ));
}

#[tokio::test]
async fn test_quorum_auto_rejects() {
    let (registry, store) = registry(true, 2);
    let (id, rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    registry.vote(id, "alice", "REJECT").await.unwrap();
    let outcome = registry.vote(id, "bob", "REJECT").await.unwrap();

    assert!(outcome.auto_resolved);
    assert_eq!(outcome.action, Some(ResolutionAction::Rejected));
    assert!(matches!(rx.try_recv().unwrap(), Delivered::Rejected(_)));

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, QueryStatus::Rejected);
}

#[tokio::test]
async fn test_cleanup_removes_all_for_connection() {
    let (registry, _) = registry(false, 2);
    let (first, first_rx) = register_probe(&registry, "conn-1", "DROP TABLE a").await;
    let (second, second_rx) = register_probe(&registry, "conn-1", "DROP TABLE b").await;
    let (other, _other_rx) = register_probe(&registry, "conn-2", "DROP TABLE c").await;

    let removed = registry.cleanup("conn-1").await;
    assert_eq!(removed, 2);

    // Neither callback fired; the buffers were dropped, not forwarded.
    assert!(first_rx.try_recv().is_err());
    assert!(second_rx.try_recv().is_err());

    assert!(matches!(
        registry.approve(first, "admin").await,
        Err(AdmissionError::NotFound)
    ));
    assert!(matches!(
        registry.approve(second, "admin").await,
        Err(AdmissionError::NotFound)
    ));

    // The other connection's query is untouched.
    registry.approve(other, "admin").await.unwrap();
}

#[tokio::test]
async fn test_concurrent_resolution_single_winner() {
    let (registry, _) = registry(false, 2);
    let registry = Arc::new(registry);
    let (id, rx) = register_probe(&registry, "conn-1", "DROP TABLE t").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                registry.approve(id, "racer").await
            } else {
                registry.reject(id, "racer").await
            }
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);

    let delivered: Vec<Delivered> = rx.try_iter().collect();
    assert_eq!(delivered.len(), 1);
}

#[tokio::test]
async fn test_preview_is_truncated() {
    let (registry, store) = registry(false, 2);
    let long_sql = format!("SELECT '{}'", "x".repeat(5000));
    let (id, _rx) = register_probe(&registry, "conn-1", &long_sql).await;

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.preview.chars().count(), 4000);
    assert!(!record.nonce.is_empty());
}
