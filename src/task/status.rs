//! Task lifecycle statuses.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a content-generation task.
///
/// `Cancelled` is fully terminal; `Published` permits only a move to
/// `OnHold`. All other reachability rules live in the transition
/// validator, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up by the pipeline.
    #[default]
    Pending,
    /// The pipeline (or a human rework) is actively producing content.
    InProgress,
    /// Content is complete and waiting for editorial review.
    AwaitingApproval,
    /// A reviewer approved the content.
    Approved,
    /// A reviewer rejected the content.
    Rejected,
    /// The content is live.
    Published,
    /// The pipeline gave up after exhausting retries.
    Failed,
    /// Temporarily parked by an operator.
    OnHold,
    /// Abandoned; no further transitions are possible.
    Cancelled,
}

impl TaskStatus {
    /// All defined statuses, in declaration order.
    pub const ALL: [TaskStatus; 9] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::AwaitingApproval,
        TaskStatus::Approved,
        TaskStatus::Rejected,
        TaskStatus::Published,
        TaskStatus::Failed,
        TaskStatus::OnHold,
        TaskStatus::Cancelled,
    ];

    /// Returns the wire/database representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::AwaitingApproval => "awaiting_approval",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Published => "published",
            TaskStatus::Failed => "failed",
            TaskStatus::OnHold => "on_hold",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if no transition out of this status exists.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "awaiting_approval" => Ok(TaskStatus::AwaitingApproval),
            "approved" => Ok(TaskStatus::Approved),
            "rejected" => Ok(TaskStatus::Rejected),
            "published" => Ok(TaskStatus::Published),
            "failed" => Ok(TaskStatus::Failed),
            "on_hold" => Ok(TaskStatus::OnHold),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}
