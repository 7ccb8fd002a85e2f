//! Audit storage backends.

use crate::error::AuditError;
use crate::event::AuditEvent;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Store an audit event.
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// Return up to `limit` most recent events, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError>;
}

/// Console storage (JSON lines on stdout).
pub struct ConsoleStorage;

#[async_trait]
impl AuditStorage for ConsoleStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(&event)?;
        println!("{}", json);
        Ok(())
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        // Console storage doesn't support retrieval.
        Ok(vec![])
    }
}

/// File storage (appends JSON lines to a log file).
pub struct FileStorage {
    path: PathBuf,
    // In-memory tail for `recent` queries.
    events: RwLock<Vec<AuditEvent>>,
}

impl FileStorage {
    /// Create a new file storage, creating parent directories as needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            events: RwLock::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(&event)?;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;

        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self
            .events
            .read()
            .map_err(|e| AuditError::StorageError(format!("failed to acquire read lock: {e}")))?;
        Ok(events.iter().rev().take(limit).cloned().collect())
    }
}

/// No-op storage for disabled audit logging.
pub struct NullStorage;

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditEventType;

    #[tokio::test]
    async fn test_file_storage_appends_and_recalls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let storage = FileStorage::new(&path).unwrap();

        for i in 0..3 {
            let event = AuditEvent::builder(AuditEventType::QueryBlocked, "system")
                .query_id(i)
                .build();
            storage.store(event).await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);

        let recent = storage.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query_id, Some(2));
    }

    #[tokio::test]
    async fn test_null_storage_is_silent() {
        let storage = NullStorage;
        let event = AuditEvent::builder(AuditEventType::VoteCast, "alice").build();
        storage.store(event).await.unwrap();
        assert!(storage.recent(10).await.unwrap().is_empty());
    }
}
