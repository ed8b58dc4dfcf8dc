//! The single write path for task status.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audit::{AuditLog, StatusChangeRecord};
use crate::storage::{StoreError, TaskStore};
use crate::task::TaskStatus;

use super::validator::{TransitionContext, TransitionValidator};

/// Hard failures of a status change call.
///
/// Validation rejections are not errors; they come back as a
/// [`StatusChangeOutcome`] with `success = false`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No task with the given id exists.
    #[error("task {0} not found")]
    NotFound(Uuid),

    /// A concurrent writer committed a transition first. The caller may
    /// retry its intent against the now-current status.
    #[error("concurrent update on task {task_id}: expected '{expected}', found '{actual}'")]
    Conflict {
        task_id: Uuid,
        expected: TaskStatus,
        actual: TaskStatus,
    },

    /// The task store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Everything a caller can attach to one transition request.
#[derive(Debug, Clone, Default)]
pub struct StatusChangeRequest {
    /// Requested target status.
    pub new_status: TaskStatus,
    /// Free-text reason; required for transitions into `rejected`.
    pub reason: Option<String>,
    /// Approval kind; required for transitions into `awaiting_approval`.
    pub approval_type: Option<String>,
    /// Acting identity recorded on the audit trail.
    pub actor_id: Option<String>,
    /// Pipeline stage recorded on the audit trail.
    pub stage: Option<String>,
    /// Opaque extension metadata.
    pub extra: HashMap<String, String>,
}

impl StatusChangeRequest {
    /// Creates a request targeting the given status.
    pub fn to(new_status: TaskStatus) -> Self {
        Self {
            new_status,
            ..Self::default()
        }
    }

    /// Sets the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the approval type.
    pub fn with_approval_type(mut self, approval_type: impl Into<String>) -> Self {
        self.approval_type = Some(approval_type.into());
        self
    }

    /// Sets the acting identity.
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Sets the pipeline stage context.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Adds one opaque extension value.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Structured result of one status change call.
#[derive(Debug, Clone)]
pub struct StatusChangeOutcome {
    /// Whether the transition was committed.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Validator errors when rejected, empty on success.
    pub errors: Vec<String>,
    /// Secondary, non-fatal problems (audit write failures).
    pub warnings: Vec<String>,
}

impl StatusChangeOutcome {
    fn committed(from: TaskStatus, to: TaskStatus, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            message: format!("status changed from '{}' to '{}'", from, to),
            errors: Vec::new(),
            warnings,
        }
    }

    fn rejected(
        from: TaskStatus,
        attempted: TaskStatus,
        errors: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            message: format!(
                "transition from '{}' to '{}' rejected",
                from, attempted
            ),
            errors,
            warnings,
        }
    }
}

/// Orchestrates one status change: validate, persist, audit.
///
/// Guarantees that at most one logical transition commits per task at a
/// time: the persist step only lands when the task's stored status still
/// equals the status read at the start of the call, so the loser of a
/// race observes [`ServiceError::Conflict`] instead of overwriting. The
/// losing attempt is still recorded on the audit trail as rejected, so
/// every invocation leaves exactly one record.
///
/// Audit durability is best-effort relative to the primary state change:
/// a failed append never rolls back a committed transition, it is logged
/// and reported as a warning on the outcome instead.
pub struct StatusChangeService {
    tasks: Arc<dyn TaskStore>,
    audit: AuditLog,
    validator: TransitionValidator,
}

impl StatusChangeService {
    /// Creates a service over the given task store and audit log.
    pub fn new(tasks: Arc<dyn TaskStore>, audit: AuditLog) -> Self {
        Self {
            tasks,
            audit,
            validator: TransitionValidator::new(),
        }
    }

    /// Attempts one status transition.
    ///
    /// A rejected transition leaves the task untouched, writes a
    /// rejected-attempt audit record and returns `success = false` with
    /// the full validator error list. No partial mutation ever occurs.
    pub async fn change_status(
        &self,
        task_id: Uuid,
        request: StatusChangeRequest,
    ) -> Result<StatusChangeOutcome, ServiceError> {
        let mut task = self
            .tasks
            .load(task_id)
            .await?
            .ok_or(ServiceError::NotFound(task_id))?;

        let observed_status = task.status;
        let context = TransitionContext {
            reason: request.reason.clone(),
            approval_type: request.approval_type.clone(),
            has_result: task.result.is_some(),
        };
        let validation = self
            .validator
            .validate(observed_status, request.new_status, &context);

        if !validation.allowed {
            debug!(
                %task_id,
                from = %observed_status,
                to = %request.new_status,
                errors = ?validation.errors,
                "transition rejected"
            );
            let record = self
                .build_record(task_id, observed_status, &request, false)
                .with_errors(validation.errors.clone());
            let warnings = self.append_audit(&record).await;
            return Ok(StatusChangeOutcome::rejected(
                observed_status,
                request.new_status,
                validation.errors,
                warnings,
            ));
        }

        task.status = request.new_status;
        task.updated_at = Utc::now();

        match self.tasks.save_expecting(&task, observed_status).await {
            Ok(()) => {}
            Err(StoreError::StaleStatus {
                task_id,
                expected,
                actual,
            }) => {
                debug!(
                    %task_id,
                    expected = %expected,
                    actual = %actual,
                    "transition lost the race"
                );
                // The conflicted attempt still leaves a trail entry.
                let record = self
                    .build_record(task_id, observed_status, &request, false)
                    .with_errors(vec![format!(
                        "concurrent update: expected '{}', found '{}'",
                        expected, actual
                    )]);
                self.append_audit(&record).await;
                return Err(ServiceError::Conflict {
                    task_id,
                    expected,
                    actual,
                });
            }
            Err(StoreError::TaskNotFound(id)) => return Err(ServiceError::NotFound(id)),
            Err(other) => return Err(other.into()),
        }

        debug!(
            %task_id,
            from = %observed_status,
            to = %request.new_status,
            "transition committed"
        );

        let record = self.build_record(task_id, observed_status, &request, true);
        let warnings = self.append_audit(&record).await;

        Ok(StatusChangeOutcome::committed(
            observed_status,
            request.new_status,
            warnings,
        ))
    }

    /// Returns a task's transition history, newest first.
    pub async fn history(
        &self,
        task_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<StatusChangeRecord>, ServiceError> {
        match self.audit.history(task_id, limit).await {
            Ok(records) => Ok(records),
            Err(crate::audit::AuditError::Store(e)) => Err(e.into()),
        }
    }

    /// Returns a task's rejected transition attempts, newest first.
    pub async fn failures(
        &self,
        task_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<StatusChangeRecord>, ServiceError> {
        match self.audit.failures(task_id, limit).await {
            Ok(records) => Ok(records),
            Err(crate::audit::AuditError::Store(e)) => Err(e.into()),
        }
    }

    fn build_record(
        &self,
        task_id: Uuid,
        old_status: TaskStatus,
        request: &StatusChangeRequest,
        accepted: bool,
    ) -> StatusChangeRecord {
        let mut record = if accepted {
            StatusChangeRecord::accepted(task_id, old_status, request.new_status)
        } else {
            StatusChangeRecord::rejected(task_id, old_status, request.new_status)
        };

        if let Some(reason) = &request.reason {
            record = record.with_reason(reason.clone());
        }
        if let Some(actor) = &request.actor_id {
            record = record.with_actor(actor.clone());
        }
        if let Some(stage) = &request.stage {
            record = record.with_stage(stage.clone());
        }
        if let Some(approval_type) = &request.approval_type {
            record = record.with_extra("approval_type", approval_type.clone());
        }
        for (key, value) in &request.extra {
            record = record.with_extra(key.clone(), value.clone());
        }
        record
    }

    /// Appends an audit record, converting failure into a warning.
    async fn append_audit(&self, record: &StatusChangeRecord) -> Vec<String> {
        match self.audit.append(record).await {
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(task_id = %record.task_id, error = %e, "audit write failed");
                vec![format!("audit write failed: {}", e)]
            }
        }
    }
}
