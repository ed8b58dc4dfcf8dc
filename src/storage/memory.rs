//! In-memory store implementations.
//!
//! Used by unit and integration tests, and by local runs that do not
//! have a database at hand. The task store performs the same
//! status-expectation check the PostgreSQL backend does, under a single
//! write lock, so the concurrency guarantee holds here too.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audit::StatusChangeRecord;
use crate::quality::QualityEvaluation;
use crate::task::{Task, TaskStatus};

use super::{AuditStore, EvaluationStore, StoreError, TaskStore};

/// Task store backed by a hash map.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Returns true if no tasks are stored.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::Backend(format!(
                "task {} already exists",
                task.id
            )));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn save_expecting(
        &self,
        task: &Task,
        expected_status: TaskStatus,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let current = tasks
            .get(&task.id)
            .ok_or(StoreError::TaskNotFound(task.id))?;

        if current.status != expected_status {
            return Err(StoreError::StaleStatus {
                task_id: task.id,
                expected: expected_status,
                actual: current.status,
            });
        }

        tasks.insert(task.id, task.clone());
        Ok(())
    }
}

/// Append-only audit store backed by a vector.
#[derive(Default)]
pub struct InMemoryAuditStore {
    records: RwLock<Vec<StatusChangeRecord>>,
}

impl InMemoryAuditStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all tasks.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn filtered(
        &self,
        task_id: Uuid,
        limit: usize,
        rejected_only: bool,
    ) -> Vec<StatusChangeRecord> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.task_id == task_id && (!rejected_only || !r.accepted))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: &StatusChangeRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query(
        &self,
        task_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StatusChangeRecord>, StoreError> {
        Ok(self.filtered(task_id, limit, false).await)
    }

    async fn query_rejected(
        &self,
        task_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StatusChangeRecord>, StoreError> {
        Ok(self.filtered(task_id, limit, true).await)
    }
}

/// Evaluation store backed by a vector.
#[derive(Default)]
pub struct InMemoryEvaluationStore {
    evaluations: RwLock<Vec<QualityEvaluation>>,
}

impl InMemoryEvaluationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EvaluationStore for InMemoryEvaluationStore {
    async fn save(&self, evaluation: &QualityEvaluation) -> Result<(), StoreError> {
        self.evaluations.write().await.push(evaluation.clone());
        Ok(())
    }

    async fn list(&self, task_id: Uuid) -> Result<Vec<QualityEvaluation>, StoreError> {
        let mut evaluations: Vec<QualityEvaluation> = self
            .evaluations
            .read()
            .await
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        evaluations.sort_by_key(|e| e.attempt_number);
        Ok(evaluations)
    }
}
