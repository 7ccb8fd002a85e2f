//! Audit logger implementation.
//!
//! Provides the main [`AuditLogger`] type with helper methods for the
//! admission workflow, replay detection, and connection lifecycle events.

use querygate_core::AuditConfig;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};
use crate::storage::{AuditStorage, ConsoleStorage, FileStorage, NullStorage};

/// The main audit logger.
pub struct AuditLogger {
    enabled: bool,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = if !config.enabled {
            Arc::new(NullStorage)
        } else if config.stdout {
            Arc::new(ConsoleStorage)
        } else {
            Arc::new(FileStorage::new(Self::resolve_log_path(config))?)
        };

        Ok(Self {
            enabled: config.enabled,
            storage,
        })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(storage: Arc<dyn AuditStorage>) -> Self {
        Self {
            enabled: true,
            storage,
        }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            storage: Arc::new(NullStorage),
        }
    }

    fn resolve_log_path(config: &AuditConfig) -> PathBuf {
        let mut path = PathBuf::from(&config.directory);
        path.push("audit.log");
        path
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            actor = %event.actor,
            "Audit event"
        );

        self.storage.store(event).await
    }

    /// Log a query being held for approval.
    pub async fn log_blocked(
        &self,
        conn_id: &str,
        query_id: i64,
        sql: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::QueryBlocked, "system")
            .conn_id(conn_id)
            .query_id(query_id)
            .sql(sql)
            .build();
        self.log(event).await
    }

    /// Log a resolution (approve or reject) of a held query.
    pub async fn log_resolution(
        &self,
        approved: bool,
        query_id: i64,
        actor: &str,
        preview: &str,
    ) -> Result<(), AuditError> {
        let event_type = if approved {
            AuditEventType::QueryApproved
        } else {
            AuditEventType::QueryRejected
        };
        let event = AuditEvent::builder(event_type, actor)
            .query_id(query_id)
            .sql(preview)
            .build();
        self.log(event).await
    }

    /// Log a peer vote.
    pub async fn log_vote(
        &self,
        query_id: i64,
        voter: &str,
        vote: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::VoteCast, voter)
            .query_id(query_id)
            .detail(vote)
            .build();
        self.log(event).await
    }

    /// Log a replay-protection failure as a security event.
    pub async fn log_replay_detected(
        &self,
        actor: &str,
        detail: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::ReplayDetected, actor)
            .detail(detail)
            .build();
        self.log(event).await
    }

    /// Log a client connect or disconnect.
    pub async fn log_connection(
        &self,
        connected: bool,
        conn_id: &str,
    ) -> Result<(), AuditError> {
        let event_type = if connected {
            AuditEventType::ClientConnected
        } else {
            AuditEventType::ClientDisconnected
        };
        let event = AuditEvent::builder(event_type, "system")
            .conn_id(conn_id)
            .build();
        self.log(event).await
    }

    /// Log a failed backend dial.
    pub async fn log_backend_dial_failed(
        &self,
        conn_id: &str,
        detail: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::BackendDialFailed, "system")
            .conn_id(conn_id)
            .detail(detail)
            .build();
        self.log(event).await
    }

    /// Return up to `limit` most recent events, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.recent(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_logger_drops_events() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());
        logger.log_blocked("conn-1", 1, "DROP TABLE t").await.unwrap();
        assert!(logger.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logger_with_file_storage_records_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path().join("audit.log")).unwrap());
        let logger = AuditLogger::with_storage(storage);

        logger.log_blocked("conn-1", 7, "DROP TABLE t").await.unwrap();
        logger.log_vote(7, "alice", "APPROVE").await.unwrap();
        logger.log_resolution(true, 7, "system:peer-approval", "DROP TABLE t").await.unwrap();

        let recent = logger.recent(10).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].event_type, AuditEventType::QueryApproved);
        assert_eq!(recent[2].event_type, AuditEventType::QueryBlocked);
    }
}
