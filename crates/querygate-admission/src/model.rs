//! Persisted data model for blocked queries and peer votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum number of characters kept in a query preview.
pub const PREVIEW_MAX_CHARS: usize = 4000;

/// How the query arrived on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    /// A `'Q'` Simple Query message.
    Simple,
    /// A Parse/Bind/.../Sync extended-protocol batch.
    Extended,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "SIMPLE"),
            Self::Extended => write!(f, "EXTENDED"),
        }
    }
}

/// Resolution status of a blocked query.
///
/// Transitions `Pending` → `Approved` or `Pending` → `Rejected`, exactly
/// once, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Pending,
    Approved,
    Rejected,
}

/// A peer voter's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteChoice {
    Approve,
    Reject,
}

impl FromStr for VoteChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            other => Err(format!("unknown vote type: {other}")),
        }
    }
}

/// A persisted blocked-query record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedQuery {
    /// Store-assigned id; zero until inserted.
    pub id: i64,

    /// The connection the query was suspended on.
    pub conn_id: String,

    /// Simple or extended protocol.
    pub kind: QueryKind,

    /// Truncated SQL preview (at most [`PREVIEW_MAX_CHARS`] characters).
    pub preview: String,

    /// Current resolution status.
    pub status: QueryStatus,

    /// When the query was blocked.
    pub created_at: DateTime<Utc>,

    /// When the query was resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,

    /// Who resolved the query, if it has been.
    pub resolved_by: Option<String>,

    /// Number of distinct approving voters.
    pub approval_count: usize,

    /// Number of distinct rejecting voters.
    pub rejection_count: usize,

    /// Single-use token tied to this query's resolution requests.
    pub nonce: String,

    /// Whether resolution requires a peer-voting quorum.
    pub requires_peer_approval: bool,
}

impl BlockedQuery {
    /// Build a fresh pending record. The id is assigned by the store.
    pub fn new(
        conn_id: &str,
        kind: QueryKind,
        sql: &str,
        nonce: String,
        requires_peer_approval: bool,
    ) -> Self {
        Self {
            id: 0,
            conn_id: conn_id.to_string(),
            kind,
            preview: truncate_chars(sql, PREVIEW_MAX_CHARS),
            status: QueryStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
            approval_count: 0,
            rejection_count: 0,
            nonce,
            requires_peer_approval,
        }
    }
}

/// A persisted peer vote, unique per (query, voter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// The blocked query voted on.
    pub query_id: i64,

    /// The voter's identity.
    pub voter: String,

    /// The vote cast.
    pub vote: VoteChoice,

    /// When the vote was last cast or changed.
    pub voted_at: DateTime<Utc>,
}

/// Truncate a string to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
