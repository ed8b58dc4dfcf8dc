//! Pure transition validation: state table plus contextual rules.

use std::collections::HashMap;

use crate::task::TaskStatus;

/// Context supplied alongside a requested transition.
///
/// Some targets require more than a table lookup: `awaiting_approval`
/// needs an approval type, `rejected` needs a reason, and `published`
/// needs the task's result payload to exist.
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    /// Free-text reason for the transition.
    pub reason: Option<String>,
    /// Kind of approval being requested (e.g. "editorial").
    pub approval_type: Option<String>,
    /// Whether the task carries a populated result payload.
    pub has_result: bool,
}

impl TransitionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
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

    /// Marks the task as carrying a result payload.
    pub fn with_result(mut self) -> Self {
        self.has_result = true;
        self
    }

    fn has_nonempty_reason(&self) -> bool {
        self.reason.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    fn has_nonempty_approval_type(&self) -> bool {
        self.approval_type
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty())
    }
}

/// Result of validating one requested transition.
///
/// When disallowed, `errors` enumerates every violated rule at once;
/// table violations and missing-context violations are never
/// short-circuited against each other.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// Whether the transition may proceed.
    pub allowed: bool,
    /// All violated rules, empty when allowed.
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            allowed: errors.is_empty(),
            errors,
        }
    }
}

/// Validates task status transitions against the lifecycle state table.
///
/// Performs no I/O; given the same inputs it always produces the same
/// outcome.
pub struct TransitionValidator {
    valid_transitions: HashMap<TaskStatus, Vec<TaskStatus>>,
}

impl TransitionValidator {
    /// Creates a validator with the standard lifecycle table.
    pub fn new() -> Self {
        let mut valid_transitions = HashMap::new();

        valid_transitions.insert(
            TaskStatus::Pending,
            vec![TaskStatus::InProgress, TaskStatus::Failed, TaskStatus::Cancelled],
        );
        valid_transitions.insert(
            TaskStatus::InProgress,
            vec![
                TaskStatus::AwaitingApproval,
                TaskStatus::Failed,
                TaskStatus::OnHold,
                TaskStatus::Cancelled,
            ],
        );
        valid_transitions.insert(
            TaskStatus::AwaitingApproval,
            vec![
                TaskStatus::Approved,
                TaskStatus::Rejected,
                TaskStatus::InProgress,
                TaskStatus::Cancelled,
            ],
        );
        valid_transitions.insert(
            TaskStatus::Approved,
            vec![TaskStatus::Published, TaskStatus::OnHold, TaskStatus::Cancelled],
        );
        valid_transitions.insert(TaskStatus::Published, vec![TaskStatus::OnHold]);
        valid_transitions.insert(
            TaskStatus::Failed,
            vec![TaskStatus::Pending, TaskStatus::Cancelled],
        );
        valid_transitions.insert(
            TaskStatus::OnHold,
            vec![TaskStatus::InProgress, TaskStatus::Cancelled],
        );
        valid_transitions.insert(
            TaskStatus::Rejected,
            vec![TaskStatus::InProgress, TaskStatus::Cancelled],
        );
        valid_transitions.insert(TaskStatus::Cancelled, vec![]);

        Self { valid_transitions }
    }

    /// Checks whether the state table permits `from -> to`.
    pub fn can_transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.valid_transitions
            .get(&from)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    /// Validates a requested transition, reporting every violated rule.
    pub fn validate(
        &self,
        from: TaskStatus,
        to: TaskStatus,
        context: &TransitionContext,
    ) -> ValidationOutcome {
        let mut errors = Vec::new();

        if !self.can_transition(from, to) {
            errors.push(format!(
                "transition from '{}' to '{}' is not allowed",
                from, to
            ));
        }

        match to {
            TaskStatus::AwaitingApproval if !context.has_nonempty_approval_type() => {
                errors.push(
                    "transition to 'awaiting_approval' requires a non-empty approval_type"
                        .to_string(),
                );
            }
            TaskStatus::Rejected if !context.has_nonempty_reason() => {
                errors.push("transition to 'rejected' requires a non-empty reason".to_string());
            }
            TaskStatus::Published if !context.has_result => {
                errors.push(
                    "transition to 'published' requires a populated result payload".to_string(),
                );
            }
            _ => {}
        }

        ValidationOutcome::from_errors(errors)
    }

    /// Returns the allowed targets for a status, empty for terminal ones.
    pub fn allowed_targets(&self, from: TaskStatus) -> &[TaskStatus] {
        self.valid_transitions
            .get(&from)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for TransitionValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TransitionContext {
        TransitionContext::new()
    }

    #[test]
    fn test_table_allows_documented_transitions() {
        let v = TransitionValidator::new();
        let allowed = [
            (TaskStatus::Pending, TaskStatus::InProgress),
            (TaskStatus::Pending, TaskStatus::Failed),
            (TaskStatus::Pending, TaskStatus::Cancelled),
            (TaskStatus::InProgress, TaskStatus::AwaitingApproval),
            (TaskStatus::InProgress, TaskStatus::Failed),
            (TaskStatus::InProgress, TaskStatus::OnHold),
            (TaskStatus::InProgress, TaskStatus::Cancelled),
            (TaskStatus::AwaitingApproval, TaskStatus::Approved),
            (TaskStatus::AwaitingApproval, TaskStatus::Rejected),
            (TaskStatus::AwaitingApproval, TaskStatus::InProgress),
            (TaskStatus::AwaitingApproval, TaskStatus::Cancelled),
            (TaskStatus::Approved, TaskStatus::Published),
            (TaskStatus::Approved, TaskStatus::OnHold),
            (TaskStatus::Approved, TaskStatus::Cancelled),
            (TaskStatus::Published, TaskStatus::OnHold),
            (TaskStatus::Failed, TaskStatus::Pending),
            (TaskStatus::Failed, TaskStatus::Cancelled),
            (TaskStatus::OnHold, TaskStatus::InProgress),
            (TaskStatus::OnHold, TaskStatus::Cancelled),
            (TaskStatus::Rejected, TaskStatus::InProgress),
            (TaskStatus::Rejected, TaskStatus::Cancelled),
        ];

        for (from, to) in allowed {
            assert!(v.can_transition(from, to), "{} -> {} should be allowed", from, to);
        }

        // Everything else is denied.
        for from in TaskStatus::ALL {
            for to in TaskStatus::ALL {
                if !allowed.contains(&(from, to)) {
                    assert!(!v.can_transition(from, to), "{} -> {} should be denied", from, to);
                }
            }
        }
    }

    #[test]
    fn test_cancelled_has_no_exits() {
        let v = TransitionValidator::new();
        assert!(v.allowed_targets(TaskStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_awaiting_approval_requires_approval_type() {
        let v = TransitionValidator::new();

        let outcome = v.validate(TaskStatus::InProgress, TaskStatus::AwaitingApproval, &ctx());
        assert!(!outcome.allowed);
        assert!(outcome.errors[0].contains("approval_type"));

        let outcome = v.validate(
            TaskStatus::InProgress,
            TaskStatus::AwaitingApproval,
            &ctx().with_approval_type("editorial"),
        );
        assert!(outcome.allowed);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_blank_approval_type_is_rejected() {
        let v = TransitionValidator::new();
        let outcome = v.validate(
            TaskStatus::InProgress,
            TaskStatus::AwaitingApproval,
            &ctx().with_approval_type("   "),
        );
        assert!(!outcome.allowed);
    }

    #[test]
    fn test_rejected_requires_reason() {
        let v = TransitionValidator::new();

        let outcome = v.validate(TaskStatus::AwaitingApproval, TaskStatus::Rejected, &ctx());
        assert!(!outcome.allowed);
        assert!(outcome.errors[0].contains("reason"));

        let outcome = v.validate(
            TaskStatus::AwaitingApproval,
            TaskStatus::Rejected,
            &ctx().with_reason("off-topic"),
        );
        assert!(outcome.allowed);
    }

    #[test]
    fn test_published_requires_result() {
        let v = TransitionValidator::new();

        let outcome = v.validate(TaskStatus::Approved, TaskStatus::Published, &ctx());
        assert!(!outcome.allowed);
        assert!(outcome.errors[0].contains("result"));

        let outcome = v.validate(TaskStatus::Approved, TaskStatus::Published, &ctx().with_result());
        assert!(outcome.allowed);
    }

    #[test]
    fn test_all_violations_reported_together() {
        let v = TransitionValidator::new();

        // Table violation AND missing reason, both reported.
        let outcome = v.validate(TaskStatus::Pending, TaskStatus::Rejected, &ctx());
        assert!(!outcome.allowed);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors.iter().any(|e| e.contains("not allowed")));
        assert!(outcome.errors.iter().any(|e| e.contains("reason")));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let v = TransitionValidator::new();
        let a = v.validate(TaskStatus::Pending, TaskStatus::Published, &ctx());
        let b = v.validate(TaskStatus::Pending, TaskStatus::Published, &ctx());
        assert_eq!(a.errors, b.errors);
    }
}
