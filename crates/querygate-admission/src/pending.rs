//! Transient state for a suspended query.

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashSet;

/// Callback forwarding the original bytes to the backend. Ownership of the
/// bytes passes to the callback; it is invoked at most once.
pub type ForwardFn = Box<dyn FnOnce(Bytes) + Send>;

/// Callback delivering a rejection reason to the client. Invoked at most
/// once; the registry keeps ownership of the original bytes.
pub type RejectFn = Box<dyn FnOnce(String) + Send>;

/// A suspended query held in memory by the registry.
///
/// Exists from `register` until resolution or connection cleanup, whichever
/// comes first. Removal from the registry map is the single point of
/// destruction, so the callbacks and bytes can never be used twice.
pub(crate) struct PendingQuery {
    pub id: i64,
    pub conn_id: String,
    /// The original wire bytes, withheld from the backend.
    pub original: Bytes,
    pub forward: ForwardFn,
    pub reject: RejectFn,
    /// Identities currently voting to approve.
    pub approvals: HashSet<String>,
    /// Identities currently voting to reject.
    pub rejections: HashSet<String>,
}

/// Read-only snapshot of a suspended query's vote state.
#[derive(Debug, Clone, Serialize)]
pub struct VoteStatus {
    pub id: i64,
    pub approvals: Vec<String>,
    pub rejections: Vec<String>,
    pub approval_count: usize,
    pub rejection_count: usize,
}

impl VoteStatus {
    pub(crate) fn snapshot(pending: &PendingQuery) -> Self {
        let mut approvals: Vec<String> = pending.approvals.iter().cloned().collect();
        let mut rejections: Vec<String> = pending.rejections.iter().cloned().collect();
        approvals.sort();
        rejections.sort();
        Self {
            id: pending.id,
            approval_count: approvals.len(),
            rejection_count: rejections.len(),
            approvals,
            rejections,
        }
    }
}
