//! Audit record types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskStatus;

/// Typed metadata attached to an audit record.
///
/// The well-known fields stay queryable; anything collaborator-specific
/// goes in the `extra` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditMetadata {
    /// Who requested the transition (user id, "orchestrator", ...).
    pub actor_id: Option<String>,
    /// Pipeline stage active when the transition was requested.
    pub stage: Option<String>,
    /// Validator errors, populated on rejected attempts.
    pub errors: Vec<String>,
    /// Opaque extension values.
    pub extra: HashMap<String, String>,
}

impl AuditMetadata {
    /// Returns true if no field carries data.
    pub fn is_empty(&self) -> bool {
        self.actor_id.is_none()
            && self.stage.is_none()
            && self.errors.is_empty()
            && self.extra.is_empty()
    }
}

/// One status transition attempt, accepted or rejected.
///
/// Rejected attempts carry `accepted = false`, the attempted target in
/// `new_status`, and the validator's error list in `metadata.errors`;
/// the task itself was left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Task this record belongs to.
    pub task_id: Uuid,
    /// Status the task held when the attempt was made.
    pub old_status: TaskStatus,
    /// Committed status, or the attempted target when rejected.
    pub new_status: TaskStatus,
    /// Whether the transition was committed.
    pub accepted: bool,
    /// Free-text reason supplied by the caller.
    pub reason: Option<String>,
    /// Typed metadata plus opaque extension values.
    pub metadata: AuditMetadata,
    /// When the attempt happened.
    pub timestamp: DateTime<Utc>,
}

impl StatusChangeRecord {
    /// Creates a record for a committed transition.
    pub fn accepted(task_id: Uuid, old_status: TaskStatus, new_status: TaskStatus) -> Self {
        Self::new(task_id, old_status, new_status, true)
    }

    /// Creates a record for a rejected transition attempt.
    pub fn rejected(task_id: Uuid, old_status: TaskStatus, attempted: TaskStatus) -> Self {
        Self::new(task_id, old_status, attempted, false)
    }

    fn new(task_id: Uuid, old_status: TaskStatus, new_status: TaskStatus, accepted: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            old_status,
            new_status,
            accepted,
            reason: None,
            metadata: AuditMetadata::default(),
            timestamp: Utc::now(),
        }
    }

    /// Sets the transition reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the acting identity.
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.metadata.actor_id = Some(actor_id.into());
        self
    }

    /// Sets the pipeline stage context.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.metadata.stage = Some(stage.into());
        self
    }

    /// Attaches validator errors (rejected attempts).
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.metadata.errors = errors;
        self
    }

    /// Adds one opaque extension value.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_record_builder() {
        let task_id = Uuid::new_v4();
        let record = StatusChangeRecord::accepted(task_id, TaskStatus::Pending, TaskStatus::InProgress)
            .with_reason("pipeline started")
            .with_actor("orchestrator")
            .with_stage("research");

        assert!(record.accepted);
        assert_eq!(record.old_status, TaskStatus::Pending);
        assert_eq!(record.new_status, TaskStatus::InProgress);
        assert_eq!(record.reason.as_deref(), Some("pipeline started"));
        assert_eq!(record.metadata.actor_id.as_deref(), Some("orchestrator"));
        assert!(record.metadata.errors.is_empty());
    }

    #[test]
    fn test_rejected_record_keeps_attempted_target() {
        let record = StatusChangeRecord::rejected(
            Uuid::new_v4(),
            TaskStatus::InProgress,
            TaskStatus::Published,
        )
        .with_errors(vec!["transition from 'in_progress' to 'published' is not allowed".into()]);

        assert!(!record.accepted);
        assert_eq!(record.new_status, TaskStatus::Published);
        assert_eq!(record.metadata.errors.len(), 1);
    }

    #[test]
    fn test_metadata_is_empty() {
        let mut metadata = AuditMetadata::default();
        assert!(metadata.is_empty());

        metadata.extra.insert("source".into(), "api".into());
        assert!(!metadata.is_empty());
    }
}
