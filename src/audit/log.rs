//! Append/read interface over the audit store.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::storage::{AuditStore, StoreError};

use super::record::StatusChangeRecord;

/// Hard cap on records returned by a single history query.
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Errors produced by audit log operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The underlying store failed.
    #[error("audit store error: {0}")]
    Store(#[from] StoreError),
}

/// Append-only writer/reader over persisted status change records.
///
/// The log itself requires no locking; appends go straight to the store
/// and records are immutable once written.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    /// Creates a log over the given store.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Appends one record, returning its id.
    pub async fn append(&self, record: &StatusChangeRecord) -> Result<Uuid, AuditError> {
        self.store.append(record).await?;
        Ok(record.id)
    }

    /// Returns a task's records, newest first.
    ///
    /// `limit` is clamped to [`MAX_HISTORY_LIMIT`]; `None` means the cap.
    pub async fn history(
        &self,
        task_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<StatusChangeRecord>, AuditError> {
        let limit = Self::effective_limit(limit);
        Ok(self.store.query(task_id, limit).await?)
    }

    /// Returns only rejected-attempt records, newest first.
    pub async fn failures(
        &self,
        task_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<StatusChangeRecord>, AuditError> {
        let limit = Self::effective_limit(limit);
        Ok(self.store.query_rejected(task_id, limit).await?)
    }

    fn effective_limit(limit: Option<usize>) -> usize {
        limit.unwrap_or(MAX_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT)
    }
}
