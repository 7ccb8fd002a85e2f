//! Persistence boundary for blocked queries and votes.
//!
//! The real deployment backs this with a database owned by the API layer;
//! this workspace ships [`MemoryStore`], which is also what the tests use.

use crate::model::{ApprovalRecord, BlockedQuery, QueryStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised by a [`QueryStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to perform the operation.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Storage backend for blocked-query records and their votes.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Persist a new record, assigning its id.
    async fn insert(&self, query: BlockedQuery) -> Result<BlockedQuery, StoreError>;

    /// Fetch a record by id.
    async fn get(&self, id: i64) -> Result<Option<BlockedQuery>, StoreError>;

    /// Transition a record out of `Pending`, stamping resolver and time.
    async fn mark_resolved(
        &self,
        id: i64,
        status: QueryStatus,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Upsert a vote (unique per query and voter) and persist the
    /// recomputed counts.
    async fn record_vote(
        &self,
        record: ApprovalRecord,
        approval_count: usize,
        rejection_count: usize,
    ) -> Result<(), StoreError>;

    /// Fetch the votes recorded for a query.
    async fn votes(&self, id: i64) -> Result<Vec<ApprovalRecord>, StoreError>;

    /// All records still pending, oldest first.
    async fn list_pending(&self) -> Result<Vec<BlockedQuery>, StoreError>;
}

struct StoredQuery {
    query: BlockedQuery,
    votes: HashMap<String, ApprovalRecord>,
}

/// In-memory [`QueryStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<i64, StoredQuery>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, StoredQuery>>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Backend(format!("poisoned lock: {e}")))
    }
}

#[async_trait]
impl QueryStore for MemoryStore {
    async fn insert(&self, mut query: BlockedQuery) -> Result<BlockedQuery, StoreError> {
        query.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock()?;
        inner.insert(
            query.id,
            StoredQuery {
                query: query.clone(),
                votes: HashMap::new(),
            },
        );
        Ok(query)
    }

    async fn get(&self, id: i64) -> Result<Option<BlockedQuery>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.get(&id).map(|stored| stored.query.clone()))
    }

    async fn mark_resolved(
        &self,
        id: i64,
        status: QueryStatus,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let stored = inner
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("no record for id {id}")))?;
        stored.query.status = status;
        stored.query.resolved_by = Some(resolved_by.to_string());
        stored.query.resolved_at = Some(resolved_at);
        Ok(())
    }

    async fn record_vote(
        &self,
        record: ApprovalRecord,
        approval_count: usize,
        rejection_count: usize,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let stored = inner
            .get_mut(&record.query_id)
            .ok_or_else(|| StoreError::Backend(format!("no record for id {}", record.query_id)))?;
        stored.votes.insert(record.voter.clone(), record);
        stored.query.approval_count = approval_count;
        stored.query.rejection_count = rejection_count;
        Ok(())
    }

    async fn votes(&self, id: i64) -> Result<Vec<ApprovalRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .get(&id)
            .map(|stored| stored.votes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_pending(&self) -> Result<Vec<BlockedQuery>, StoreError> {
        let inner = self.lock()?;
        let mut pending: Vec<_> = inner
            .values()
            .filter(|stored| stored.query.status == QueryStatus::Pending)
            .map(|stored| stored.query.clone())
            .collect();
        pending.sort_by_key(|q| (q.created_at, q.id));
        Ok(pending)
    }
}
