//! Audit event types.
//!
//! Events carry the actor, the affected connection and query, and a
//! free-form detail string. Replay detections are a distinct event type so
//! they can be filtered as security events rather than ordinary validation
//! failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // ===== Admission workflow =====
    /// A query was held for approval.
    QueryBlocked,
    /// A held query was approved and forwarded.
    QueryApproved,
    /// A held query was rejected.
    QueryRejected,
    /// A peer vote was cast on a held query.
    VoteCast,

    // ===== Security events =====
    /// A resolution request failed replay validation.
    ReplayDetected,

    // ===== Connection lifecycle =====
    /// A client connected to the listener.
    ClientConnected,
    /// A client disconnected.
    ClientDisconnected,
    /// The backend dial failed for a connection.
    BackendDialFailed,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueryBlocked => write!(f, "QUERY_BLOCKED"),
            Self::QueryApproved => write!(f, "QUERY_APPROVED"),
            Self::QueryRejected => write!(f, "QUERY_REJECTED"),
            Self::VoteCast => write!(f, "VOTE_CAST"),
            Self::ReplayDetected => write!(f, "REPLAY_DETECTED"),
            Self::ClientConnected => write!(f, "CLIENT_CONNECTED"),
            Self::ClientDisconnected => write!(f, "CLIENT_DISCONNECTED"),
            Self::BackendDialFailed => write!(f, "BACKEND_DIAL_FAILED"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// Who performed the action (resolver, voter, or `"system"`).
    pub actor: String,

    /// Connection ID (for correlation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conn_id: Option<String>,

    /// Blocked query ID (for admission events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<i64>,

    /// SQL preview (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    /// Free-form detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Start building an event of the given type.
    pub fn builder(event_type: AuditEventType, actor: &str) -> AuditEventBuilder {
        AuditEventBuilder {
            event: AuditEvent {
                event_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
                event_type,
                actor: actor.to_string(),
                conn_id: None,
                query_id: None,
                sql: None,
                detail: None,
            },
        }
    }
}

/// Builder for [`AuditEvent`].
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    /// Set the connection ID.
    pub fn conn_id(mut self, conn_id: &str) -> Self {
        self.event.conn_id = Some(conn_id.to_string());
        self
    }

    /// Set the blocked query ID.
    pub fn query_id(mut self, query_id: i64) -> Self {
        self.event.query_id = Some(query_id);
        self
    }

    /// Set the SQL preview.
    pub fn sql(mut self, sql: &str) -> Self {
        self.event.sql = Some(sql.to_string());
        self
    }

    /// Set the detail string.
    pub fn detail(mut self, detail: &str) -> Self {
        self.event.detail = Some(detail.to_string());
        self
    }

    /// Finish building.
    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let event = AuditEvent::builder(AuditEventType::QueryApproved, "admin")
            .conn_id("conn-7")
            .query_id(42)
            .sql("DROP TABLE users")
            .build();

        assert_eq!(event.event_type, AuditEventType::QueryApproved);
        assert_eq!(event.actor, "admin");
        assert_eq!(event.conn_id.as_deref(), Some("conn-7"));
        assert_eq!(event.query_id, Some(42));
        assert!(event.detail.is_none());
    }

    #[test]
    fn test_event_serializes_without_empty_fields() {
        let event = AuditEvent::builder(AuditEventType::ReplayDetected, "mallory").build();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"replay_detected\""));
        assert!(!json.contains("conn_id"));
        assert!(!json.contains("sql"));
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(AuditEventType::QueryBlocked.to_string(), "QUERY_BLOCKED");
        assert_eq!(AuditEventType::ReplayDetected.to_string(), "REPLAY_DETECTED");
    }
}
