//! The seven-stage pipeline run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{OutcomeCapture, OutcomeRecord};
use crate::collaborators::{
    ArticleMetadata, CollaboratorError, DraftRequest, Drafter, ImageFinder, MetadataGenerator,
    Refiner, Researcher,
};
use crate::lifecycle::{ServiceError, StatusChangeRequest, StatusChangeService};
use crate::quality::{QualityEvaluation, QualityGate};
use crate::storage::{EvaluationStore, StoreError, TaskStore};
use crate::task::{ContentResult, TaskStatus};

use super::config::{ConfigError, PipelineConfig};

/// Actor identity the orchestrator records on its transitions.
const PIPELINE_ACTOR: &str = "orchestrator";

/// Character budget for the fallback summary.
const FALLBACK_SUMMARY_LEN: usize = 160;

/// Errors that can occur during a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The task does not exist.
    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    /// The task is not in a status the pipeline can pick up.
    #[error("task {task_id} cannot be run from status '{status}'")]
    NotRunnable { task_id: Uuid, status: TaskStatus },

    /// A critical stage exhausted its retries.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: PipelineStage,
        source: CollaboratorError,
    },

    /// A status transition requested by the orchestrator was rejected.
    #[error("transition at stage '{stage}' rejected: {}", .errors.join("; "))]
    TransitionRejected {
        stage: PipelineStage,
        errors: Vec<String>,
    },

    /// The status change service failed.
    #[error("status change failed: {0}")]
    Status(#[from] ServiceError),

    /// The task store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The concurrency limiter was closed.
    #[error("concurrency limiter closed")]
    LimiterClosed,
}

/// One step of the generation pipeline, distinct from task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Gather background material.
    Research,
    /// Produce a full body.
    Draft,
    /// Score the draft against the quality gate.
    Evaluate,
    /// Revise the draft using gate feedback.
    Refine,
    /// Attach an image (non-fatal).
    ImageSourcing,
    /// Derive SEO metadata (non-fatal).
    MetadataGeneration,
    /// Persist the result and hand the task to review.
    Finalize,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Research => "research",
            PipelineStage::Draft => "draft",
            PipelineStage::Evaluate => "evaluate",
            PipelineStage::Refine => "refine",
            PipelineStage::ImageSourcing => "image_sourcing",
            PipelineStage::MetadataGeneration => "metadata_generation",
            PipelineStage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The task reached `awaiting_approval`.
    Completed,
    /// The task was cancelled externally mid-run; the orchestrator
    /// aborted without further transitions.
    Cancelled,
}

/// Report of one finished pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Task that was run.
    pub task_id: Uuid,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Quality-driven refine attempts consumed.
    pub refine_attempts: u32,
    /// Best overall quality score observed.
    pub best_score: Option<f64>,
    /// Whether the quality gate passed (as opposed to accepting the
    /// best draft after the retry budget ran out).
    pub gate_passed: bool,
    /// Non-fatal problems recorded during the run.
    pub warnings: Vec<String>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl PipelineRun {
    fn cancelled(
        task_id: Uuid,
        refine_attempts: u32,
        best_score: Option<f64>,
        warnings: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            task_id,
            outcome: RunOutcome::Cancelled,
            refine_attempts,
            best_score,
            gate_passed: false,
            warnings,
            duration,
        }
    }
}

/// Statistics about pipeline execution.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total runs started.
    pub total_runs: u64,
    /// Runs that reached `awaiting_approval`.
    pub completed: u64,
    /// Runs that ended with the task `failed`.
    pub failed: u64,
    /// Runs aborted by external cancellation.
    pub cancelled: u64,
    /// Average run duration.
    pub average_duration: Duration,
}

impl PipelineStats {
    fn record_completion(&mut self, duration: Duration) {
        self.completed += 1;
        self.record(duration);
    }

    fn record_failure(&mut self, duration: Duration) {
        self.failed += 1;
        self.record(duration);
    }

    fn record_cancellation(&mut self, duration: Duration) {
        self.cancelled += 1;
        self.record(duration);
    }

    fn record(&mut self, duration: Duration) {
        self.total_runs += 1;
        if self.total_runs == 1 {
            self.average_duration = duration;
        } else {
            // Incremental average: avg = avg + (new - avg) / n
            let n = self.total_runs as f64;
            let old_avg = self.average_duration.as_secs_f64();
            let new_avg = old_avg + (duration.as_secs_f64() - old_avg) / n;
            self.average_duration = Duration::from_secs_f64(new_avg);
        }
    }
}

/// External collaborators the pipeline calls between transitions.
pub struct Collaborators {
    /// Produces background research.
    pub researcher: Arc<dyn Researcher>,
    /// Produces the article body.
    pub drafter: Arc<dyn Drafter>,
    /// Revises the body from gate feedback.
    pub refiner: Arc<dyn Refiner>,
    /// Locates an image for the topic.
    pub image_finder: Arc<dyn ImageFinder>,
    /// Derives SEO metadata.
    pub metadata_generator: Arc<dyn MetadataGenerator>,
}

/// Drives one task through the seven-stage lifecycle.
///
/// A semaphore bounds how many pipelines execute at once. All status
/// mutation goes through the status change service, and the task's
/// status is re-checked at each stage boundary so an external
/// cancellation aborts the run.
pub struct PipelineOrchestrator {
    collaborators: Collaborators,
    gate: QualityGate,
    status: Arc<StatusChangeService>,
    tasks: Arc<dyn TaskStore>,
    evaluations: Arc<dyn EvaluationStore>,
    capture: Option<Arc<OutcomeCapture>>,
    config: PipelineConfig,
    limiter: Arc<Semaphore>,
    stats: Arc<RwLock<PipelineStats>>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with the given collaborators and stores.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the configuration is invalid.
    pub fn new(
        collaborators: Collaborators,
        gate: QualityGate,
        status: Arc<StatusChangeService>,
        tasks: Arc<dyn TaskStore>,
        evaluations: Arc<dyn EvaluationStore>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        // The config's threshold is authoritative for the gate.
        let gate = gate.with_threshold(config.quality_threshold);
        let capture = config
            .capture_path
            .as_ref()
            .map(|path| Arc::new(OutcomeCapture::new(path.clone())));
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_tasks));

        Ok(Self {
            collaborators,
            gate,
            status,
            tasks,
            evaluations,
            capture,
            config,
            limiter,
            stats: Arc::new(RwLock::new(PipelineStats::default())),
        })
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns a snapshot of the execution statistics.
    pub async fn stats(&self) -> PipelineStats {
        self.stats.read().await.clone()
    }

    /// Runs one task's pipeline to completion.
    ///
    /// On a critical-stage failure the task is moved to `failed` and the
    /// underlying error is returned. External cancellation mid-run ends
    /// the run with [`RunOutcome::Cancelled`] and no further transitions.
    pub async fn run(&self, task_id: Uuid) -> Result<PipelineRun, PipelineError> {
        let started = Instant::now();
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| PipelineError::LimiterClosed)?;

        let task = self
            .tasks
            .load(task_id)
            .await?
            .ok_or(PipelineError::TaskNotFound(task_id))?;

        match task.status {
            TaskStatus::Pending => {
                self.transition(
                    task_id,
                    PipelineStage::Research,
                    StatusChangeRequest::to(TaskStatus::InProgress)
                        .with_reason("pipeline run started")
                        .with_actor(PIPELINE_ACTOR)
                        .with_stage(PipelineStage::Research.to_string()),
                )
                .await?;
            }
            TaskStatus::InProgress => {}
            status => {
                return Err(PipelineError::NotRunnable { task_id, status });
            }
        }

        info!(%task_id, topic = %task.topic, "pipeline run started");
        let mut warnings: Vec<String> = Vec::new();

        // Stage 1: research.
        let research = {
            let researcher = Arc::clone(&self.collaborators.researcher);
            let topic = task.topic.clone();
            let style = task.style.clone();
            let result = self
                .call_with_retry(
                    PipelineStage::Research,
                    "researcher",
                    self.config.research_timeout,
                    move || {
                        let researcher = Arc::clone(&researcher);
                        let topic = topic.clone();
                        let style = style.clone();
                        async move { researcher.research(&topic, &style).await }
                    },
                )
                .await;
            match result {
                Ok(text) => text,
                Err(e) => return self.fail_task(task_id, PipelineStage::Research, e, started).await,
            }
        };

        // Stage 2: draft.
        if self.is_cancelled(task_id).await? {
            return Ok(self.abort_cancelled(task_id, 0, None, warnings, started).await);
        }
        let draft = {
            let drafter = Arc::clone(&self.collaborators.drafter);
            let research = research.clone();
            let topic = task.topic.clone();
            let style = task.style.clone();
            let tone = task.tone.clone();
            let target_length = self.config.target_length;
            let result = self
                .call_with_retry(
                    PipelineStage::Draft,
                    "drafter",
                    self.config.draft_timeout,
                    move || {
                        let drafter = Arc::clone(&drafter);
                        let research = research.clone();
                        let topic = topic.clone();
                        let style = style.clone();
                        let tone = tone.clone();
                        async move {
                            drafter
                                .draft(DraftRequest {
                                    research: &research,
                                    topic: &topic,
                                    style: &style,
                                    tone: &tone,
                                    target_length,
                                })
                                .await
                        }
                    },
                )
                .await;
            match result {
                Ok(text) => text,
                Err(e) => return self.fail_task(task_id, PipelineStage::Draft, e, started).await,
            }
        };

        // Stages 3 and 4: evaluate, with the conditional refine loop.
        // The loop is bounded by max_retries; once the budget is spent
        // the best-scoring draft proceeds regardless of the gate.
        if self.is_cancelled(task_id).await? {
            return Ok(self.abort_cancelled(task_id, 0, None, warnings, started).await);
        }
        let mut attempt: u32 = 1;
        let mut current_draft = draft;
        let mut evaluation = match self.evaluate_attempt(task_id, attempt, &current_draft).await {
            Ok(evaluation) => evaluation,
            Err(e) => return self.fail_task(task_id, PipelineStage::Evaluate, e, started).await,
        };

        let mut best_draft = current_draft.clone();
        let mut best_score = evaluation.overall_score;
        let mut refine_attempts: u32 = 0;

        while !evaluation.passing && refine_attempts < self.config.max_retries {
            if self.is_cancelled(task_id).await? {
                return Ok(self
                    .abort_cancelled(task_id, refine_attempts, Some(best_score), warnings, started)
                    .await);
            }

            refine_attempts += 1;
            debug!(
                %task_id,
                attempt = refine_attempts,
                score = evaluation.overall_score,
                "draft below threshold, refining"
            );

            let refined = match timeout(
                self.config.refine_timeout,
                self.collaborators
                    .refiner
                    .refine(&current_draft, &evaluation.feedback),
            )
            .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(%task_id, error = %e, "refine failed, keeping best draft");
                    warnings.push(format!("refine attempt {} failed: {}", refine_attempts, e));
                    break;
                }
                Err(_) => {
                    warn!(%task_id, "refine timed out, keeping best draft");
                    warnings.push(format!("refine attempt {} timed out", refine_attempts));
                    break;
                }
            };

            current_draft = refined;
            attempt += 1;
            evaluation = match self.evaluate_attempt(task_id, attempt, &current_draft).await {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    return self.fail_task(task_id, PipelineStage::Evaluate, e, started).await
                }
            };

            if evaluation.overall_score >= best_score {
                best_score = evaluation.overall_score;
                best_draft = current_draft.clone();
            }
        }

        let gate_passed = evaluation.passing;
        let final_draft = if gate_passed {
            current_draft
        } else {
            info!(
                %task_id,
                best_score,
                refine_attempts,
                "retry budget exhausted, accepting best draft"
            );
            best_draft
        };

        // Stage 5: image sourcing. Failure degrades to a warning.
        if self.is_cancelled(task_id).await? {
            return Ok(self
                .abort_cancelled(task_id, refine_attempts, Some(best_score), warnings, started)
                .await);
        }
        let image_reference = match timeout(
            self.config.image_timeout,
            self.collaborators.image_finder.find(&task.topic),
        )
        .await
        {
            Ok(Ok(reference)) => reference,
            Ok(Err(e)) => {
                warn!(%task_id, error = %e, "image sourcing failed, continuing without image");
                warnings.push(format!("image sourcing failed: {}", e));
                None
            }
            Err(_) => {
                warn!(%task_id, "image sourcing timed out, continuing without image");
                warnings.push("image sourcing timed out".to_string());
                None
            }
        };

        // Stage 6: metadata generation. Failure degrades to a fallback.
        if self.is_cancelled(task_id).await? {
            return Ok(self
                .abort_cancelled(task_id, refine_attempts, Some(best_score), warnings, started)
                .await);
        }
        let metadata = match timeout(
            self.config.metadata_timeout,
            self.collaborators.metadata_generator.generate(&final_draft),
        )
        .await
        {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => {
                warn!(%task_id, error = %e, "metadata generation failed, using fallback");
                warnings.push(format!("metadata generation failed: {}", e));
                fallback_metadata(&task.topic, &final_draft)
            }
            Err(_) => {
                warn!(%task_id, "metadata generation timed out, using fallback");
                warnings.push("metadata generation timed out".to_string());
                fallback_metadata(&task.topic, &final_draft)
            }
        };

        // Stage 7: finalize.
        if self.is_cancelled(task_id).await? {
            return Ok(self
                .abort_cancelled(task_id, refine_attempts, Some(best_score), warnings, started)
                .await);
        }

        let mut result = ContentResult::new(metadata.title, final_draft)
            .with_summary(metadata.summary)
            .with_keywords(metadata.keywords);
        if let Some(reference) = image_reference {
            result = result.with_image_reference(reference);
        }

        let mut task = self
            .tasks
            .load(task_id)
            .await?
            .ok_or(PipelineError::TaskNotFound(task_id))?;
        task.result = Some(result);
        task.retry_count = refine_attempts;
        task.warnings.extend(warnings.iter().cloned());
        task.updated_at = chrono::Utc::now();

        match self.tasks.save_expecting(&task, TaskStatus::InProgress).await {
            Ok(()) => {}
            Err(StoreError::StaleStatus { actual, .. }) => {
                if actual == TaskStatus::Cancelled {
                    return Ok(self
                        .abort_cancelled(task_id, refine_attempts, Some(best_score), warnings, started)
                        .await);
                }
                return Err(ServiceError::Conflict {
                    task_id,
                    expected: TaskStatus::InProgress,
                    actual,
                }
                .into());
            }
            Err(other) => return Err(other.into()),
        }

        match self
            .status
            .change_status(
                task_id,
                StatusChangeRequest::to(TaskStatus::AwaitingApproval)
                    .with_reason("content generated, ready for review")
                    .with_approval_type(self.config.approval_type.clone())
                    .with_actor(PIPELINE_ACTOR)
                    .with_stage(PipelineStage::Finalize.to_string())
                    .with_extra("refine_attempts", refine_attempts.to_string()),
            )
            .await
        {
            Ok(outcome) if outcome.success => {}
            Ok(outcome) => {
                return Err(PipelineError::TransitionRejected {
                    stage: PipelineStage::Finalize,
                    errors: outcome.errors,
                });
            }
            Err(ServiceError::Conflict { actual, .. }) if actual == TaskStatus::Cancelled => {
                return Ok(self
                    .abort_cancelled(task_id, refine_attempts, Some(best_score), warnings, started)
                    .await);
            }
            Err(e) => return Err(e.into()),
        }

        let duration = started.elapsed();
        self.capture_outcome(&task, refine_attempts, best_score, gate_passed, &warnings);
        {
            let mut stats = self.stats.write().await;
            stats.record_completion(duration);
        }

        info!(
            %task_id,
            refine_attempts,
            best_score,
            gate_passed,
            warning_count = warnings.len(),
            "pipeline run completed, task awaiting approval"
        );

        Ok(PipelineRun {
            task_id,
            outcome: RunOutcome::Completed,
            refine_attempts,
            best_score: Some(best_score),
            gate_passed,
            warnings,
            duration,
        })
    }

    /// Runs many tasks concurrently, bounded by `max_concurrent_tasks`.
    pub async fn run_batch(&self, task_ids: Vec<Uuid>) -> Vec<Result<PipelineRun, PipelineError>> {
        if task_ids.is_empty() {
            return Vec::new();
        }

        let futures: Vec<_> = task_ids.into_iter().map(|id| self.run(id)).collect();
        join_all(futures).await
    }

    /// Scores one draft attempt, with bounded retry around the scorer,
    /// and persists the evaluation best-effort.
    async fn evaluate_attempt(
        &self,
        task_id: Uuid,
        attempt: u32,
        draft: &str,
    ) -> Result<QualityEvaluation, CollaboratorError> {
        let gate = &self.gate;
        let draft = draft.to_string();
        let evaluation = self
            .call_with_retry(
                PipelineStage::Evaluate,
                "scorer",
                self.config.scoring_timeout,
                move || {
                    let draft = draft.clone();
                    async move { gate.evaluate(task_id, attempt, &draft).await }
                },
            )
            .await?;

        if let Err(e) = self.evaluations.save(&evaluation).await {
            warn!(%task_id, attempt, error = %e, "failed to persist quality evaluation");
        }

        Ok(evaluation)
    }

    /// Retries a collaborator call up to `max_retries`, each attempt
    /// under its own timeout.
    async fn call_with_retry<T, F, Fut>(
        &self,
        stage: PipelineStage,
        collaborator: &'static str,
        per_call_timeout: Duration,
        mut call: F,
    ) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CollaboratorError>>,
    {
        let mut last_error: Option<CollaboratorError> = None;

        for attempt in 1..=self.config.max_retries {
            match timeout(per_call_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    warn!(stage = %stage, attempt, error = %e, "collaborator call failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(stage = %stage, attempt, "collaborator call timed out");
                    last_error = Some(CollaboratorError::Timeout {
                        collaborator,
                        timeout: per_call_timeout,
                    });
                }
            }
        }

        Err(last_error.unwrap_or(CollaboratorError::Unavailable {
            collaborator,
            detail: "no attempts were made".to_string(),
        }))
    }

    /// Moves the task to `failed` and surfaces the stage error.
    async fn fail_task(
        &self,
        task_id: Uuid,
        stage: PipelineStage,
        error: CollaboratorError,
        started: Instant,
    ) -> Result<PipelineRun, PipelineError> {
        warn!(%task_id, stage = %stage, error = %error, "critical stage failed, marking task failed");

        let request = StatusChangeRequest::to(TaskStatus::Failed)
            .with_reason(error.to_string())
            .with_actor(PIPELINE_ACTOR)
            .with_stage(stage.to_string());
        match self.status.change_status(task_id, request).await {
            Ok(outcome) if !outcome.success => {
                warn!(%task_id, errors = ?outcome.errors, "could not mark task failed");
            }
            Ok(_) => {}
            Err(e) => warn!(%task_id, error = %e, "could not mark task failed"),
        }

        {
            let mut stats = self.stats.write().await;
            stats.record_failure(started.elapsed());
        }

        Err(PipelineError::Stage {
            stage,
            source: error,
        })
    }

    /// Requests a transition and treats a rejection as a pipeline error.
    async fn transition(
        &self,
        task_id: Uuid,
        stage: PipelineStage,
        request: StatusChangeRequest,
    ) -> Result<(), PipelineError> {
        let outcome = self.status.change_status(task_id, request).await?;
        if !outcome.success {
            return Err(PipelineError::TransitionRejected {
                stage,
                errors: outcome.errors,
            });
        }
        Ok(())
    }

    /// Re-checks the task's status at a stage boundary.
    async fn is_cancelled(&self, task_id: Uuid) -> Result<bool, PipelineError> {
        let task = self
            .tasks
            .load(task_id)
            .await?
            .ok_or(PipelineError::TaskNotFound(task_id))?;
        Ok(task.status == TaskStatus::Cancelled)
    }

    async fn abort_cancelled(
        &self,
        task_id: Uuid,
        refine_attempts: u32,
        best_score: Option<f64>,
        warnings: Vec<String>,
        started: Instant,
    ) -> PipelineRun {
        info!(%task_id, "task cancelled externally, aborting pipeline run");
        let duration = started.elapsed();
        {
            let mut stats = self.stats.write().await;
            stats.record_cancellation(duration);
        }
        PipelineRun::cancelled(task_id, refine_attempts, best_score, warnings, duration)
    }

    /// Captures the run outcome fire-and-forget.
    fn capture_outcome(
        &self,
        task: &crate::task::Task,
        refine_attempts: u32,
        best_score: f64,
        gate_passed: bool,
        warnings: &[String],
    ) {
        let Some(capture) = &self.capture else {
            return;
        };
        let capture = Arc::clone(capture);
        let record = OutcomeRecord {
            task_id: task.id,
            topic: task.topic.clone(),
            final_status: TaskStatus::AwaitingApproval,
            refine_attempts,
            best_score: Some(best_score),
            gate_passed,
            warnings: warnings.to_vec(),
            completed_at: chrono::Utc::now(),
        };
        tokio::spawn(async move {
            if let Err(e) = capture.append(&record).await {
                warn!(task_id = %record.task_id, error = %e, "outcome capture failed");
            }
        });
    }
}

/// Metadata used when the generator is unavailable: the topic as the
/// title and a truncated body as the summary.
fn fallback_metadata(topic: &str, body: &str) -> ArticleMetadata {
    let summary: String = body.chars().take(FALLBACK_SUMMARY_LEN).collect();
    ArticleMetadata {
        title: topic.to_string(),
        summary,
        keywords: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(format!("{}", PipelineStage::Research), "research");
        assert_eq!(format!("{}", PipelineStage::ImageSourcing), "image_sourcing");
        assert_eq!(
            format!("{}", PipelineStage::MetadataGeneration),
            "metadata_generation"
        );
        assert_eq!(format!("{}", PipelineStage::Finalize), "finalize");
    }

    #[test]
    fn test_stats_incremental_average() {
        let mut stats = PipelineStats::default();
        stats.record_completion(Duration::from_secs(60));
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.average_duration.as_secs(), 60);

        stats.record_failure(Duration::from_secs(30));
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.average_duration.as_secs(), 45);

        stats.record_cancellation(Duration::from_secs(90));
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_runs, 3);
    }

    #[test]
    fn test_fallback_metadata_truncates_summary() {
        let body = "x".repeat(500);
        let metadata = fallback_metadata("some topic", &body);
        assert_eq!(metadata.title, "some topic");
        assert_eq!(metadata.summary.chars().count(), FALLBACK_SUMMARY_LEN);
        assert!(metadata.keywords.is_empty());
    }

    #[test]
    fn test_cancelled_run_report_keeps_warnings() {
        let warnings = vec!["image sourcing failed: search index offline".to_string()];
        let run = PipelineRun::cancelled(
            Uuid::new_v4(),
            2,
            Some(6.0),
            warnings.clone(),
            Duration::from_secs(5),
        );
        assert_eq!(run.outcome, RunOutcome::Cancelled);
        assert!(!run.gate_passed);
        assert_eq!(run.refine_attempts, 2);
        assert_eq!(run.warnings, warnings);
    }
}
