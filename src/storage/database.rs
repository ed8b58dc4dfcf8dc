//! PostgreSQL backend for tasks, audit records and quality evaluations.
//!
//! Status updates use an optimistic-concurrency write: the UPDATE is
//! keyed on both the task id and the status observed at load time, so
//! of two racing writers exactly one sees its row updated and the other
//! gets a stale-status failure.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::{AuditMetadata, StatusChangeRecord};
use crate::quality::{DimensionScore, FeedbackItem, QualityEvaluation};
use crate::task::{ContentResult, Task, TaskStatus};

use super::migrations::MigrationRunner;
use super::{AuditStore, EvaluationStore, StoreError, TaskStore};

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection to the database failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be interpreted.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] super::migrations::MigrationError),
}

/// Outcome of a guarded status-expecting update.
enum GuardedUpdate {
    Updated,
    Stale { actual: TaskStatus },
    Missing,
}

/// PostgreSQL database client.
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connects to the database and returns a new client.
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Creates a new database client from an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let runner = MigrationRunner::new(self.pool.clone());
        runner.run_migrations().await?;
        Ok(())
    }

    // =========================================================================
    // Task Operations
    // =========================================================================

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let result_json = match &task.result {
            Some(result) => Some(serde_json::to_value(result)?),
            None => None,
        };
        let warnings_json = serde_json::to_value(&task.warnings)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, status, topic, style, tone, result, retry_count, warnings,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(task.id)
        .bind(task.status.as_str())
        .bind(&task.topic)
        .bind(&task.style)
        .bind(&task.tone)
        .bind(result_json)
        .bind(task.retry_count as i32)
        .bind(warnings_json)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, topic, style, tone, result, retry_count, warnings,
                   created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        Ok(Some(Self::row_to_task(&row)?))
    }

    /// Saves the task's mutable fields, guarded by the status observed
    /// at load time.
    async fn update_task_expecting(
        &self,
        task: &Task,
        expected_status: TaskStatus,
    ) -> Result<GuardedUpdate, DatabaseError> {
        let result_json = match &task.result {
            Some(result) => Some(serde_json::to_value(result)?),
            None => None,
        };
        let warnings_json = serde_json::to_value(&task.warnings)?;

        let update = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $1, result = $2, retry_count = $3, warnings = $4, updated_at = $5
            WHERE id = $6 AND status = $7
            "#,
        )
        .bind(task.status.as_str())
        .bind(result_json)
        .bind(task.retry_count as i32)
        .bind(warnings_json)
        .bind(task.updated_at)
        .bind(task.id)
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await?;

        if update.rows_affected() > 0 {
            return Ok(GuardedUpdate::Updated);
        }

        // Zero rows: either the task is gone or another writer changed
        // the status since it was loaded.
        let row = sqlx::query("SELECT status FROM tasks WHERE id = $1")
            .bind(task.id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let actual: String = r.get("status");
                Ok(GuardedUpdate::Stale {
                    actual: parse_status(&actual)?,
                })
            }
            None => Ok(GuardedUpdate::Missing),
        }
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> Result<Task, DatabaseError> {
        let status: String = row.get("status");
        let result_json: Option<serde_json::Value> = row.get("result");
        let warnings_json: serde_json::Value = row.get("warnings");
        let retry_count: i32 = row.get("retry_count");

        let result: Option<ContentResult> = match result_json {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        let warnings: Vec<String> = serde_json::from_value(warnings_json)?;

        Ok(Task {
            id: row.get("id"),
            status: parse_status(&status)?,
            topic: row.get("topic"),
            style: row.get("style"),
            tone: row.get("tone"),
            result,
            retry_count: retry_count as u32,
            warnings,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    async fn append_status_change(
        &self,
        record: &StatusChangeRecord,
    ) -> Result<(), DatabaseError> {
        let metadata_json = serde_json::to_value(&record.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO status_changes (
                id, task_id, old_status, new_status, accepted, reason, metadata, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.task_id)
        .bind(record.old_status.as_str())
        .bind(record.new_status.as_str())
        .bind(record.accepted)
        .bind(&record.reason)
        .bind(metadata_json)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_status_changes(
        &self,
        task_id: Uuid,
        limit: usize,
        rejected_only: bool,
    ) -> Result<Vec<StatusChangeRecord>, DatabaseError> {
        let query = if rejected_only {
            r#"
            SELECT id, task_id, old_status, new_status, accepted, reason, metadata, timestamp
            FROM status_changes
            WHERE task_id = $1 AND accepted = FALSE
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#
        } else {
            r#"
            SELECT id, task_id, old_status, new_status, accepted, reason, metadata, timestamp
            FROM status_changes
            WHERE task_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#
        };

        let rows = sqlx::query(query)
            .bind(task_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let old_status: String = row.get("old_status");
            let new_status: String = row.get("new_status");
            let metadata_json: serde_json::Value = row.get("metadata");
            let metadata: AuditMetadata = serde_json::from_value(metadata_json)?;
            let timestamp: DateTime<Utc> = row.get("timestamp");

            records.push(StatusChangeRecord {
                id: row.get("id"),
                task_id: row.get("task_id"),
                old_status: parse_status(&old_status)?,
                new_status: parse_status(&new_status)?,
                accepted: row.get("accepted"),
                reason: row.get("reason"),
                metadata,
                timestamp,
            });
        }

        Ok(records)
    }

    // =========================================================================
    // Quality Evaluation Operations
    // =========================================================================

    async fn save_evaluation(&self, evaluation: &QualityEvaluation) -> Result<(), DatabaseError> {
        let scores_json = serde_json::to_value(&evaluation.scores)?;
        let feedback_json = serde_json::to_value(&evaluation.feedback)?;

        sqlx::query(
            r#"
            INSERT INTO quality_evaluations (
                id, task_id, attempt_number, scores, overall_score, passing,
                feedback, evaluated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(evaluation.id)
        .bind(evaluation.task_id)
        .bind(evaluation.attempt_number as i32)
        .bind(scores_json)
        .bind(evaluation.overall_score)
        .bind(evaluation.passing)
        .bind(feedback_json)
        .bind(evaluation.evaluated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_evaluations(
        &self,
        task_id: Uuid,
    ) -> Result<Vec<QualityEvaluation>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT id, task_id, attempt_number, scores, overall_score, passing,
                   feedback, evaluated_at
            FROM quality_evaluations
            WHERE task_id = $1
            ORDER BY attempt_number
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        let mut evaluations = Vec::with_capacity(rows.len());
        for row in rows {
            let attempt_number: i32 = row.get("attempt_number");
            let scores_json: serde_json::Value = row.get("scores");
            let feedback_json: serde_json::Value = row.get("feedback");
            let scores: Vec<DimensionScore> = serde_json::from_value(scores_json)?;
            let feedback: Vec<FeedbackItem> = serde_json::from_value(feedback_json)?;

            evaluations.push(QualityEvaluation {
                id: row.get("id"),
                task_id: row.get("task_id"),
                attempt_number: attempt_number as u32,
                scores,
                overall_score: row.get("overall_score"),
                passing: row.get("passing"),
                feedback,
                evaluated_at: row.get("evaluated_at"),
            });
        }

        Ok(evaluations)
    }
}

fn parse_status(raw: &str) -> Result<TaskStatus, DatabaseError> {
    TaskStatus::from_str(raw).map_err(DatabaseError::InvalidData)
}

fn backend(e: DatabaseError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl TaskStore for Database {
    async fn insert(&self, task: &Task) -> Result<(), StoreError> {
        self.insert_task(task).await.map_err(backend)
    }

    async fn load(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.load_task(id).await.map_err(backend)
    }

    async fn save_expecting(
        &self,
        task: &Task,
        expected_status: TaskStatus,
    ) -> Result<(), StoreError> {
        match self
            .update_task_expecting(task, expected_status)
            .await
            .map_err(backend)?
        {
            GuardedUpdate::Updated => Ok(()),
            GuardedUpdate::Stale { actual } => Err(StoreError::StaleStatus {
                task_id: task.id,
                expected: expected_status,
                actual,
            }),
            GuardedUpdate::Missing => Err(StoreError::TaskNotFound(task.id)),
        }
    }
}

#[async_trait]
impl AuditStore for Database {
    async fn append(&self, record: &StatusChangeRecord) -> Result<(), StoreError> {
        self.append_status_change(record).await.map_err(backend)
    }

    async fn query(
        &self,
        task_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StatusChangeRecord>, StoreError> {
        self.list_status_changes(task_id, limit, false)
            .await
            .map_err(backend)
    }

    async fn query_rejected(
        &self,
        task_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StatusChangeRecord>, StoreError> {
        self.list_status_changes(task_id, limit, true)
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl EvaluationStore for Database {
    async fn save(&self, evaluation: &QualityEvaluation) -> Result<(), StoreError> {
        self.save_evaluation(evaluation).await.map_err(backend)
    }

    async fn list(&self, task_id: Uuid) -> Result<Vec<QualityEvaluation>, StoreError> {
        self.list_evaluations(task_id).await.map_err(backend)
    }
}
