//! End-to-end tests of the status state machine: validation, auditing,
//! and concurrent writers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Barrier;
use uuid::Uuid;

use contentforge::audit::AuditLog;
use contentforge::lifecycle::{ServiceError, StatusChangeRequest, StatusChangeService};
use contentforge::storage::{
    AuditStore, InMemoryAuditStore, InMemoryTaskStore, StoreError, TaskStore,
};
use contentforge::task::{ContentResult, Task, TaskStatus};

fn service_over(tasks: Arc<dyn TaskStore>) -> StatusChangeService {
    StatusChangeService::new(tasks, AuditLog::new(Arc::new(InMemoryAuditStore::new())))
}

async fn new_task(tasks: &InMemoryTaskStore) -> Uuid {
    let task = Task::new("solar panel maintenance");
    let id = task.id;
    tasks.insert(&task).await.expect("insert");
    id
}

#[tokio::test]
async fn test_review_scenario_audits_every_attempt() {
    let tasks = Arc::new(InMemoryTaskStore::new());
    let service = service_over(tasks.clone());
    let task_id = new_task(&tasks).await;

    // pending -> in_progress commits.
    let outcome = service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::InProgress))
        .await
        .expect("change");
    assert!(outcome.success);

    // Skipping straight to published is rejected and leaves the task alone.
    let outcome = service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::Published))
        .await
        .expect("change");
    assert!(!outcome.success);
    let task = tasks.load(task_id).await.expect("load").expect("exists");
    assert_eq!(task.status, TaskStatus::InProgress);

    // awaiting_approval without an approval type is rejected...
    let outcome = service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::AwaitingApproval))
        .await
        .expect("change");
    assert!(!outcome.success);
    assert!(outcome.errors.iter().any(|e| e.contains("approval_type")));

    // ...and commits once the approval type is supplied.
    let outcome = service
        .change_status(
            task_id,
            StatusChangeRequest::to(TaskStatus::AwaitingApproval)
                .with_approval_type("editorial")
                .with_actor("editor-1"),
        )
        .await
        .expect("change");
    assert!(outcome.success);

    // Two accepted and two rejected attempts, all on the trail.
    let history = service.history(task_id, None).await.expect("history");
    assert_eq!(history.len(), 4);
    assert_eq!(history.iter().filter(|r| r.accepted).count(), 2);

    // Reading the history again without an intervening change returns
    // the identical ordered list.
    let again = service.history(task_id, None).await.expect("history");
    assert_eq!(history, again);

    let failures = service.failures(task_id, None).await.expect("failures");
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|r| !r.accepted));
    // Newest first: the approval_type rejection precedes the publish skip.
    assert_eq!(failures[0].new_status, TaskStatus::AwaitingApproval);
    assert_eq!(failures[1].new_status, TaskStatus::Published);
}

#[tokio::test]
async fn test_rejection_requires_a_reason() {
    let tasks = Arc::new(InMemoryTaskStore::new());
    let service = service_over(tasks.clone());
    let task_id = new_task(&tasks).await;

    for (status, request) in [
        (TaskStatus::InProgress, StatusChangeRequest::to(TaskStatus::InProgress)),
        (
            TaskStatus::AwaitingApproval,
            StatusChangeRequest::to(TaskStatus::AwaitingApproval).with_approval_type("editorial"),
        ),
    ] {
        let outcome = service.change_status(task_id, request).await.expect("change");
        assert!(outcome.success, "setup transition to {} failed", status);
    }

    let outcome = service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::Rejected))
        .await
        .expect("change");
    assert!(!outcome.success);
    assert!(outcome.errors.iter().any(|e| e.contains("reason")));

    // A whitespace-only reason does not count.
    let outcome = service
        .change_status(
            task_id,
            StatusChangeRequest::to(TaskStatus::Rejected).with_reason("   "),
        )
        .await
        .expect("change");
    assert!(!outcome.success);

    let outcome = service
        .change_status(
            task_id,
            StatusChangeRequest::to(TaskStatus::Rejected).with_reason("thin on sources"),
        )
        .await
        .expect("change");
    assert!(outcome.success);
}

#[tokio::test]
async fn test_publishing_requires_a_result() {
    let tasks = Arc::new(InMemoryTaskStore::new());
    let service = service_over(tasks.clone());
    let task_id = new_task(&tasks).await;

    for request in [
        StatusChangeRequest::to(TaskStatus::InProgress),
        StatusChangeRequest::to(TaskStatus::AwaitingApproval).with_approval_type("editorial"),
        StatusChangeRequest::to(TaskStatus::Approved),
    ] {
        assert!(service.change_status(task_id, request).await.expect("change").success);
    }

    // Table-valid, but the task has no content yet.
    let outcome = service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::Published))
        .await
        .expect("change");
    assert!(!outcome.success);
    assert!(outcome.errors.iter().any(|e| e.contains("result")));

    let mut task = tasks.load(task_id).await.expect("load").expect("exists");
    task.result = Some(ContentResult::new("Solar Panel Maintenance", "body text"));
    tasks
        .save_expecting(&task, TaskStatus::Approved)
        .await
        .expect("save");

    let outcome = service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::Published))
        .await
        .expect("change");
    assert!(outcome.success);
}

#[tokio::test]
async fn test_cancelled_is_terminal() {
    let tasks = Arc::new(InMemoryTaskStore::new());
    let service = service_over(tasks.clone());
    let task_id = new_task(&tasks).await;

    assert!(service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::Cancelled))
        .await
        .expect("change")
        .success);

    for target in TaskStatus::ALL {
        let outcome = service
            .change_status(task_id, StatusChangeRequest::to(target))
            .await
            .expect("change");
        assert!(!outcome.success, "cancelled -> {} must be rejected", target);
    }
}

/// Task store that holds the first two loaders at a barrier so both
/// observe the same pre-transition snapshot.
struct BarrierStore {
    inner: InMemoryTaskStore,
    barrier: Barrier,
    gated_loads: AtomicUsize,
}

impl BarrierStore {
    fn new(inner: InMemoryTaskStore) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            gated_loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TaskStore for BarrierStore {
    async fn insert(&self, task: &Task) -> Result<(), StoreError> {
        self.inner.insert(task).await
    }

    async fn load(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let snapshot = self.inner.load(id).await;
        // Rendezvous after the read so both writers hold the same
        // pre-transition snapshot.
        if self.gated_loads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        snapshot
    }

    async fn save_expecting(
        &self,
        task: &Task,
        expected_status: TaskStatus,
    ) -> Result<(), StoreError> {
        self.inner.save_expecting(task, expected_status).await
    }
}

#[tokio::test]
async fn test_concurrent_writers_commit_exactly_once() {
    let inner = InMemoryTaskStore::new();
    let task = Task::new("hydroponic basil");
    let task_id = task.id;
    inner.insert(&task).await.expect("insert");

    let tasks = Arc::new(BarrierStore::new(inner));
    let service = Arc::new(service_over(tasks.clone()));

    let a = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .change_status(task_id, StatusChangeRequest::to(TaskStatus::InProgress))
                .await
        })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .change_status(task_id, StatusChangeRequest::to(TaskStatus::Cancelled))
                .await
        })
    };

    let results = [a.await.expect("join"), b.await.expect("join")];
    let committed = results
        .iter()
        .filter(|r| matches!(r, Ok(outcome) if outcome.success))
        .count();
    let conflicted = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::Conflict { .. })))
        .count();
    assert_eq!(committed, 1, "exactly one writer must commit");
    assert_eq!(conflicted, 1, "the loser must observe a conflict");

    // Both invocations leave a record: the winner's accepted, the
    // loser's rejected with the conflict spelled out.
    let history = service.history(task_id, None).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|r| r.accepted).count(), 1);
    let loser = history.iter().find(|r| !r.accepted).expect("rejected record");
    assert!(loser
        .metadata
        .errors
        .iter()
        .any(|e| e.contains("concurrent update")));
}

/// Audit store that always fails, to exercise best-effort auditing.
struct BrokenAuditStore;

#[async_trait]
impl AuditStore for BrokenAuditStore {
    async fn append(
        &self,
        _record: &contentforge::audit::StatusChangeRecord,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }

    async fn query(
        &self,
        _task_id: Uuid,
        _limit: usize,
    ) -> Result<Vec<contentforge::audit::StatusChangeRecord>, StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }

    async fn query_rejected(
        &self,
        _task_id: Uuid,
        _limit: usize,
    ) -> Result<Vec<contentforge::audit::StatusChangeRecord>, StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_audit_failure_never_rolls_back_the_transition() {
    let tasks = Arc::new(InMemoryTaskStore::new());
    let service = StatusChangeService::new(tasks.clone(), AuditLog::new(Arc::new(BrokenAuditStore)));
    let task_id = new_task(&tasks).await;

    let outcome = service
        .change_status(task_id, StatusChangeRequest::to(TaskStatus::InProgress))
        .await
        .expect("change");

    assert!(outcome.success);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("audit write failed"));

    let task = tasks.load(task_id).await.expect("load").expect("exists");
    assert_eq!(task.status, TaskStatus::InProgress);
}
