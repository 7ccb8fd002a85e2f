//! The admission registry: suspended queries, resolution, and peer voting.

use crate::error::AdmissionError;
use crate::model::{ApprovalRecord, BlockedQuery, QueryKind, QueryStatus, VoteChoice};
use crate::notify::{BlockedNotice, NotificationSink, ResolutionNotice, VoteNotice};
use crate::pending::{ForwardFn, PendingQuery, RejectFn, VoteStatus};
use crate::store::QueryStore;
use bytes::Bytes;
use chrono::Utc;
use querygate_audit::AuditLogger;
use querygate_core::ApprovalConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Resolver identity stamped on quorum auto-resolutions.
pub const PEER_RESOLVER: &str = "system:peer-approval";

/// Terminal action taken on a suspended query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    Approved,
    Rejected,
}

impl ResolutionAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a `vote` call.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    /// Whether this vote reached the quorum and resolved the query.
    pub auto_resolved: bool,
    /// The action taken, when auto-resolved.
    pub action: Option<ResolutionAction>,
    pub approval_count: usize,
    pub rejection_count: usize,
}

/// In-memory table of suspended queries with their resolution callbacks.
///
/// Shared between connection tasks (which `register` and `cleanup`) and the
/// external API layer (which calls `approve`, `reject`, `vote`,
/// `vote_status`). One async mutex over the pending map guards every
/// check-then-act sequence; an entry is removed under that lock exactly
/// once, so at most one of approve/reject/cleanup can win a given query.
pub struct AdmissionRegistry {
    pending: Mutex<HashMap<i64, PendingQuery>>,
    store: Arc<dyn QueryStore>,
    sink: Arc<dyn NotificationSink>,
    audit: Arc<AuditLogger>,
    config: ApprovalConfig,
}

impl AdmissionRegistry {
    /// Create a registry over the given collaborators.
    pub fn new(
        store: Arc<dyn QueryStore>,
        sink: Arc<dyn NotificationSink>,
        audit: Arc<AuditLogger>,
        config: ApprovalConfig,
    ) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            store,
            sink,
            audit,
            config,
        }
    }

    /// Suspend a blocked query.
    ///
    /// Persists the record, takes ownership of the original wire bytes, and
    /// stores the callbacks for later resolution. Returns the assigned id.
    pub async fn register(
        &self,
        conn_id: &str,
        kind: QueryKind,
        sql: &str,
        original: Bytes,
        forward: ForwardFn,
        reject: RejectFn,
    ) -> Result<i64, AdmissionError> {
        let nonce = Uuid::new_v4().to_string();
        let record = BlockedQuery::new(conn_id, kind, sql, nonce, self.config.peer_enabled);
        let record = self.store.insert(record).await?;

        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                record.id,
                PendingQuery {
                    id: record.id,
                    conn_id: conn_id.to_string(),
                    original,
                    forward,
                    reject,
                    approvals: Default::default(),
                    rejections: Default::default(),
                },
            );
        }

        let notice = BlockedNotice::new(
            record.id,
            conn_id,
            kind,
            &record.preview,
            record.requires_peer_approval,
        );
        if let Err(e) = self.sink.publish_blocked(&notice).await {
            tracing::warn!(query_id = record.id, error = %e, "Failed to publish blocked notification");
        }
        if let Err(e) = self.audit.log_blocked(conn_id, record.id, &record.preview).await {
            tracing::warn!(query_id = record.id, error = %e, "Failed to audit blocked query");
        }

        tracing::info!(
            query_id = record.id,
            conn_id = %conn_id,
            kind = %kind,
            "Blocked query registered"
        );
        Ok(record.id)
    }

    /// Approve a suspended query: the original bytes are forwarded to the
    /// backend via the stored callback.
    pub async fn approve(&self, id: i64, actor: &str) -> Result<(), AdmissionError> {
        let (entry, record) = self.take_resolved(id, QueryStatus::Approved, actor).await?;

        // Ownership of the bytes passes to the forward callback.
        (entry.forward)(entry.original);

        self.announce_resolution(&record, ResolutionAction::Approved, actor).await;
        tracing::info!(query_id = id, actor = %actor, "Query approved");
        Ok(())
    }

    /// Reject a suspended query: the client receives an error via the stored
    /// callback and the original bytes are dropped here, never forwarded.
    pub async fn reject(&self, id: i64, actor: &str) -> Result<(), AdmissionError> {
        let (entry, record) = self.take_resolved(id, QueryStatus::Rejected, actor).await?;

        (entry.reject)(format!("Query rejected by {actor}"));
        drop(entry.original);

        self.announce_resolution(&record, ResolutionAction::Rejected, actor).await;
        tracing::info!(query_id = id, actor = %actor, "Query rejected");
        Ok(())
    }

    /// Cast or change a peer vote. Reaching the quorum auto-resolves the
    /// query with [`PEER_RESOLVER`] as the actor.
    pub async fn vote(
        &self,
        id: i64,
        voter: &str,
        choice: &str,
    ) -> Result<VoteOutcome, AdmissionError> {
        let choice: VoteChoice = choice
            .parse()
            .map_err(AdmissionError::InvalidInput)?;

        let (approval_count, rejection_count, decision) = {
            let mut pending = self.pending.lock().await;
            let entry = pending.get_mut(&id).ok_or(AdmissionError::NotFound)?;

            let record = self
                .store
                .get(id)
                .await?
                .ok_or(AdmissionError::NotFound)?;
            if !record.requires_peer_approval {
                return Err(AdmissionError::InvalidState);
            }

            // Same-vote resubmission is a no-op: current counts, no write.
            let already = match choice {
                VoteChoice::Approve => entry.approvals.contains(voter),
                VoteChoice::Reject => entry.rejections.contains(voter),
            };
            if already {
                tracing::debug!(query_id = id, voter = %voter, "Duplicate vote ignored");
                return Ok(VoteOutcome {
                    auto_resolved: false,
                    action: None,
                    approval_count: entry.approvals.len(),
                    rejection_count: entry.rejections.len(),
                });
            }

            // The in-memory sets are the source of truth for counts.
            match choice {
                VoteChoice::Approve => {
                    entry.approvals.insert(voter.to_string());
                    entry.rejections.remove(voter);
                }
                VoteChoice::Reject => {
                    entry.rejections.insert(voter.to_string());
                    entry.approvals.remove(voter);
                }
            }
            let approval_count = entry.approvals.len();
            let rejection_count = entry.rejections.len();

            self.store
                .record_vote(
                    ApprovalRecord {
                        query_id: id,
                        voter: voter.to_string(),
                        vote: choice,
                        voted_at: Utc::now(),
                    },
                    approval_count,
                    rejection_count,
                )
                .await?;

            // Quorum check, approve before reject.
            let decision = if approval_count >= self.config.min_votes {
                Some(ResolutionAction::Approved)
            } else if rejection_count >= self.config.min_votes {
                Some(ResolutionAction::Rejected)
            } else {
                None
            };
            (approval_count, rejection_count, decision)
        };

        if let Err(e) = self.audit.log_vote(id, voter, choice_label(choice)).await {
            tracing::warn!(query_id = id, error = %e, "Failed to audit vote");
        }

        match decision {
            Some(action) => {
                // The resolve can lose a race with a direct approve/reject or
                // a cleanup; the query is resolved either way.
                let result = match action {
                    ResolutionAction::Approved => self.approve(id, PEER_RESOLVER).await,
                    ResolutionAction::Rejected => self.reject(id, PEER_RESOLVER).await,
                };
                match result {
                    Ok(()) => {}
                    Err(AdmissionError::NotFound | AdmissionError::InvalidState) => {
                        tracing::debug!(query_id = id, "Quorum resolution lost race, already resolved");
                    }
                    Err(other) => return Err(other),
                }
                Ok(VoteOutcome {
                    auto_resolved: true,
                    action: Some(action),
                    approval_count,
                    rejection_count,
                })
            }
            None => {
                let notice = VoteNotice {
                    query_id: id,
                    voter: voter.to_string(),
                    vote: choice_label(choice).to_string(),
                    approval_count,
                    rejection_count,
                    timestamp: Utc::now(),
                };
                if let Err(e) = self.sink.publish_vote(&notice).await {
                    tracing::warn!(query_id = id, error = %e, "Failed to publish vote notification");
                }
                Ok(VoteOutcome {
                    auto_resolved: false,
                    action: None,
                    approval_count,
                    rejection_count,
                })
            }
        }
    }

    /// Read-only snapshot of a suspended query's vote state.
    pub async fn vote_status(&self, id: i64) -> Result<VoteStatus, AdmissionError> {
        let pending = self.pending.lock().await;
        pending
            .get(&id)
            .map(VoteStatus::snapshot)
            .ok_or(AdmissionError::NotFound)
    }

    /// Remove every suspended query for a disconnected connection, dropping
    /// the buffered bytes unforwarded. Returns the number removed.
    pub async fn cleanup(&self, conn_id: &str) -> usize {
        let removed: Vec<PendingQuery> = {
            let mut pending = self.pending.lock().await;
            let ids: Vec<i64> = pending
                .values()
                .filter(|entry| entry.conn_id == conn_id)
                .map(|entry| entry.id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id))
                .collect()
        };

        for entry in &removed {
            tracing::info!(
                query_id = entry.id,
                conn_id = %conn_id,
                "Cleaned up pending query for disconnected connection"
            );
        }
        removed.len()
    }

    /// All persisted queries still pending, oldest first.
    pub async fn pending(&self) -> Result<Vec<BlockedQuery>, AdmissionError> {
        Ok(self.store.list_pending().await?)
    }

    /// Atomically validate and remove a pending entry, transitioning the
    /// persisted record out of `Pending`. At most one caller can win.
    async fn take_resolved(
        &self,
        id: i64,
        status: QueryStatus,
        actor: &str,
    ) -> Result<(PendingQuery, BlockedQuery), AdmissionError> {
        let mut pending = self.pending.lock().await;
        if !pending.contains_key(&id) {
            return Err(AdmissionError::NotFound);
        }

        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or(AdmissionError::NotFound)?;
        if record.status != QueryStatus::Pending {
            return Err(AdmissionError::InvalidState);
        }

        let resolved_at = Utc::now();
        self.store
            .mark_resolved(id, status, actor, resolved_at)
            .await?;
        record.status = status;
        record.resolved_by = Some(actor.to_string());
        record.resolved_at = Some(resolved_at);

        let entry = pending.remove(&id).ok_or(AdmissionError::NotFound)?;
        Ok((entry, record))
    }

    async fn announce_resolution(
        &self,
        record: &BlockedQuery,
        action: ResolutionAction,
        actor: &str,
    ) {
        let notice = ResolutionNotice {
            query_id: record.id,
            action: action.to_string(),
            resolved_by: actor.to_string(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.sink.publish_resolution(&notice).await {
            tracing::warn!(query_id = record.id, error = %e, "Failed to publish resolution notification");
        }
        if let Err(e) = self
            .audit
            .log_resolution(action == ResolutionAction::Approved, record.id, actor, &record.preview)
            .await
        {
            tracing::warn!(query_id = record.id, error = %e, "Failed to audit resolution");
        }
    }
}

fn choice_label(choice: VoteChoice) -> &'static str {
    match choice {
        VoteChoice::Approve => "APPROVE",
        VoteChoice::Reject => "REJECT",
    }
}
