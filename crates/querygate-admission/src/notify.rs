//! Live notifications for the admission workflow.
//!
//! The real deployment publishes these on a pub/sub transport consumed by
//! the dashboard; here the transport is behind the [`NotificationSink`]
//! trait. Delivery is best-effort: the registry logs publish failures and
//! continues, so a broken sink can never stall a resolution.

use crate::model::QueryKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel carrying newly blocked queries.
pub const CHANNEL_BLOCKED: &str = "querygate:blocked";

/// Channel carrying approvals and rejections.
pub const CHANNEL_APPROVALS: &str = "querygate:approvals";

/// Channel carrying vote progress.
pub const CHANNEL_VOTES: &str = "querygate:votes";

/// Number of preview characters included in a blocked notification.
const NOTICE_PREVIEW_CHARS: usize = 200;

/// Errors raised by a notification sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink failed to deliver the payload.
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Payload for [`CHANNEL_BLOCKED`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedNotice {
    pub query_id: i64,
    pub conn_id: String,
    pub kind: QueryKind,
    pub preview: String,
    pub requires_peer_approval: bool,
    pub timestamp: DateTime<Utc>,
}

impl BlockedNotice {
    /// Build a notice, trimming the preview for transport.
    pub fn new(
        query_id: i64,
        conn_id: &str,
        kind: QueryKind,
        preview: &str,
        requires_peer_approval: bool,
    ) -> Self {
        Self {
            query_id,
            conn_id: conn_id.to_string(),
            kind,
            preview: crate::model::truncate_chars(preview, NOTICE_PREVIEW_CHARS),
            requires_peer_approval,
            timestamp: Utc::now(),
        }
    }
}

/// Payload for [`CHANNEL_APPROVALS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionNotice {
    pub query_id: i64,
    /// `"APPROVED"` or `"REJECTED"`.
    pub action: String,
    pub resolved_by: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload for [`CHANNEL_VOTES`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteNotice {
    pub query_id: i64,
    pub voter: String,
    pub vote: String,
    pub approval_count: usize,
    pub rejection_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Transport for admission-workflow notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Publish a newly blocked query.
    async fn publish_blocked(&self, notice: &BlockedNotice) -> Result<(), NotifyError>;

    /// Publish an approval or rejection.
    async fn publish_resolution(&self, notice: &ResolutionNotice) -> Result<(), NotifyError>;

    /// Publish vote progress.
    async fn publish_vote(&self, notice: &VoteNotice) -> Result<(), NotifyError>;
}

/// Sink that emits notifications as structured log lines.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish_blocked(&self, notice: &BlockedNotice) -> Result<(), NotifyError> {
        tracing::info!(
            channel = CHANNEL_BLOCKED,
            query_id = notice.query_id,
            conn_id = %notice.conn_id,
            kind = %notice.kind,
            requires_peer_approval = notice.requires_peer_approval,
            "Query blocked"
        );
        Ok(())
    }

    async fn publish_resolution(&self, notice: &ResolutionNotice) -> Result<(), NotifyError> {
        tracing::info!(
            channel = CHANNEL_APPROVALS,
            query_id = notice.query_id,
            action = %notice.action,
            resolved_by = %notice.resolved_by,
            "Query resolved"
        );
        Ok(())
    }

    async fn publish_vote(&self, notice: &VoteNotice) -> Result<(), NotifyError> {
        tracing::info!(
            channel = CHANNEL_VOTES,
            query_id = notice.query_id,
            voter = %notice.voter,
            vote = %notice.vote,
            approvals = notice.approval_count,
            rejections = notice.rejection_count,
            "Vote recorded"
        );
        Ok(())
    }
}
