//! CLI command definitions for contentforge.
//!
//! This module provides the command-line interface for running content
//! pipelines and for operator-driven status management.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::lifecycle::{StatusChangeRequest, StatusChangeService};
use crate::llm::{ChatClient, LlmCollaborators, OpenverseImageFinder};
use crate::pipeline::{
    Collaborators, PipelineConfig, PipelineOrchestrator, PipelineRun, RunOutcome,
};
use crate::quality::QualityGate;
use crate::storage::{AuditStore, Database, EvaluationStore, TaskStore};
use crate::task::{Task, TaskStatus};

/// Default writing style for new tasks.
const DEFAULT_STYLE: &str = "informative";

/// Default writing tone for new tasks.
const DEFAULT_TONE: &str = "neutral";

/// Content pipeline orchestrator with an auditable status lifecycle.
#[derive(Parser)]
#[command(name = "contentforge")]
#[command(about = "Run content-generation pipelines with an auditable task lifecycle")]
#[command(version)]
#[command(
    long_about = "contentforge drives content tasks through a seven-stage generation pipeline\n(research, draft, evaluate, refine, image, metadata, finalize) and records every\nstatus transition attempt, accepted or rejected, on an append-only audit trail.\n\nExample usage:\n  contentforge run \"rust async patterns\" \"postgres indexing\" --concurrency 2"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create tasks from topics and run their pipelines concurrently.
    Run(RunArgs),

    /// Request one manual status transition on a task.
    Status(StatusArgs),

    /// Show a task's transition history, newest first.
    History(AuditArgs),

    /// Show a task's rejected transition attempts, newest first.
    Failures(AuditArgs),
}

/// Arguments for `contentforge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Topics to generate content for; one task is created per topic.
    #[arg(required = true, num_args = 1..)]
    pub topics: Vec<String>,

    /// Writing style for the created tasks.
    #[arg(long, default_value = DEFAULT_STYLE)]
    pub style: String,

    /// Writing tone for the created tasks.
    #[arg(long, default_value = DEFAULT_TONE)]
    pub tone: String,

    /// Maximum refine attempts (and per-stage collaborator retries).
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Mean quality score (0-10) a draft needs to pass the gate.
    #[arg(long, default_value = "7.0")]
    pub quality_threshold: f64,

    /// Target body length in words.
    #[arg(long, default_value = "1200")]
    pub target_length: usize,

    /// Approval type recorded when the task reaches review.
    #[arg(long, default_value = "editorial")]
    pub approval_type: String,

    /// Maximum pipelines executing at once.
    #[arg(short = 'c', long, default_value = "4")]
    pub concurrency: usize,

    /// Directory for the JSONL outcome capture; disabled when omitted.
    #[arg(long)]
    pub capture_dir: Option<PathBuf>,

    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `contentforge status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Task id.
    pub task_id: Uuid,

    /// Target status (pending, in_progress, awaiting_approval, approved,
    /// rejected, published, failed, on_hold, cancelled).
    pub new_status: TaskStatus,

    /// Free-text reason; required when moving to 'rejected'.
    #[arg(short, long)]
    pub reason: Option<String>,

    /// Approval kind; required when moving to 'awaiting_approval'.
    #[arg(long)]
    pub approval_type: Option<String>,

    /// Acting identity recorded on the audit trail.
    #[arg(long)]
    pub actor: Option<String>,

    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

/// Arguments for `contentforge history` and `contentforge failures`.
#[derive(Parser, Debug)]
pub struct AuditArgs {
    /// Task id.
    pub task_id: Uuid,

    /// Maximum records to return (server-side cap applies).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Output records as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await?,
        Commands::Status(args) => run_status_command(args).await?,
        Commands::History(args) => run_audit_command(args, false).await?,
        Commands::Failures(args) => run_audit_command(args, true).await?,
    }
    Ok(())
}

async fn connect(database_url: &str) -> anyhow::Result<Arc<Database>> {
    let database = Database::connect(database_url).await?;
    database.run_migrations().await?;
    Ok(Arc::new(database))
}

fn build_service(database: &Arc<Database>) -> Arc<StatusChangeService> {
    let tasks: Arc<dyn TaskStore> = database.clone();
    let audit_store: Arc<dyn AuditStore> = database.clone();
    Arc::new(StatusChangeService::new(tasks, AuditLog::new(audit_store)))
}

#[derive(Debug, Clone, Serialize)]
struct RunEntry {
    task_id: Uuid,
    topic: String,
    outcome: String,
    refine_attempts: u32,
    best_score: Option<f64>,
    gate_passed: bool,
    warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct RunOutput {
    status: String,
    tasks: usize,
    completed: usize,
    cancelled: usize,
    failed: usize,
    results: Vec<RunEntry>,
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let database = connect(&args.database_url).await?;
    let service = build_service(&database);
    let tasks: Arc<dyn TaskStore> = database.clone();
    let evaluations: Arc<dyn EvaluationStore> = database.clone();

    let client = Arc::new(ChatClient::from_env()?);
    let llm = Arc::new(LlmCollaborators::new(client));
    let gate = QualityGate::new(llm.clone());
    let collaborators = Collaborators {
        researcher: llm.clone(),
        drafter: llm.clone(),
        refiner: llm.clone(),
        image_finder: Arc::new(OpenverseImageFinder::new()?),
        metadata_generator: llm,
    };

    let mut config = PipelineConfig::default()
        .with_max_retries(args.max_retries)
        .with_quality_threshold(args.quality_threshold)
        .with_target_length(args.target_length)
        .with_approval_type(args.approval_type.clone())
        .with_max_concurrent_tasks(args.concurrency);
    if let Some(dir) = &args.capture_dir {
        config = config.with_capture_path(dir.clone());
    }

    let orchestrator =
        PipelineOrchestrator::new(collaborators, gate, service, tasks.clone(), evaluations, config)?;

    let mut created: Vec<(Uuid, String)> = Vec::with_capacity(args.topics.len());
    for topic in &args.topics {
        let task = Task::new(topic.clone())
            .with_style(args.style.clone())
            .with_tone(args.tone.clone());
        tasks.insert(&task).await?;
        info!(task_id = %task.id, topic = %topic, "task created");
        created.push((task.id, topic.clone()));
    }

    let ids: Vec<Uuid> = created.iter().map(|(id, _)| *id).collect();
    let runs = orchestrator.run_batch(ids).await;

    let mut results = Vec::with_capacity(runs.len());
    let (mut completed, mut cancelled, mut failed) = (0usize, 0usize, 0usize);
    for ((task_id, topic), run) in created.into_iter().zip(runs) {
        match run {
            Ok(PipelineRun {
                outcome,
                refine_attempts,
                best_score,
                gate_passed,
                warnings,
                ..
            }) => {
                let outcome_name = match outcome {
                    RunOutcome::Completed => {
                        completed += 1;
                        "completed"
                    }
                    RunOutcome::Cancelled => {
                        cancelled += 1;
                        "cancelled"
                    }
                };
                results.push(RunEntry {
                    task_id,
                    topic,
                    outcome: outcome_name.to_string(),
                    refine_attempts,
                    best_score,
                    gate_passed,
                    warnings,
                });
            }
            Err(e) => {
                failed += 1;
                results.push(RunEntry {
                    task_id,
                    topic,
                    outcome: format!("failed: {}", e),
                    refine_attempts: 0,
                    best_score: None,
                    gate_passed: false,
                    warnings: Vec::new(),
                });
            }
        }
    }

    if args.json {
        let output = RunOutput {
            status: if failed == 0 { "ok" } else { "partial" }.to_string(),
            tasks: results.len(),
            completed,
            cancelled,
            failed,
            results,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("✓ Pipeline batch finished");
    println!("  Tasks:     {}", results.len());
    println!("  Completed: {}", completed);
    println!("  Cancelled: {}", cancelled);
    println!("  Failed:    {}", failed);
    for entry in &results {
        println!("  {} [{}] {}", entry.task_id, entry.outcome, entry.topic);
        if let Some(score) = entry.best_score {
            println!(
                "    score: {:.1}  refine attempts: {}  gate: {}",
                score,
                entry.refine_attempts,
                if entry.gate_passed { "passed" } else { "budget exhausted" }
            );
        }
        for warning in &entry.warnings {
            println!("    warning: {}", warning);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} pipeline runs failed", failed, results.len());
    }
    Ok(())
}

async fn run_status_command(args: StatusArgs) -> anyhow::Result<()> {
    let database = connect(&args.database_url).await?;
    let service = build_service(&database);

    let mut request = StatusChangeRequest::to(args.new_status);
    if let Some(reason) = args.reason {
        request = request.with_reason(reason);
    }
    if let Some(approval_type) = args.approval_type {
        request = request.with_approval_type(approval_type);
    }
    if let Some(actor) = args.actor {
        request = request.with_actor(actor);
    }

    let outcome = service.change_status(args.task_id, request).await?;
    for warning in &outcome.warnings {
        println!("warning: {}", warning);
    }
    if outcome.success {
        println!("✓ {}", outcome.message);
        return Ok(());
    }

    println!("✗ {}", outcome.message);
    for error in &outcome.errors {
        println!("  {}", error);
    }
    anyhow::bail!("transition rejected");
}

async fn run_audit_command(args: AuditArgs, failures_only: bool) -> anyhow::Result<()> {
    let database = connect(&args.database_url).await?;
    let service = build_service(&database);

    let records = if failures_only {
        service.failures(args.task_id, args.limit).await?
    } else {
        service.history(args.task_id, args.limit).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records for task {}", args.task_id);
        return Ok(());
    }

    for record in &records {
        let verdict = if record.accepted { "accepted" } else { "rejected" };
        println!(
            "{}  {} -> {}  [{}]",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.old_status,
            record.new_status,
            verdict
        );
        if let Some(reason) = &record.reason {
            println!("    reason: {}", reason);
        }
        if let Some(actor) = &record.metadata.actor_id {
            println!("    actor: {}", actor);
        }
        if let Some(stage) = &record.metadata.stage {
            println!("    stage: {}", stage);
        }
        for error in &record.metadata.errors {
            println!("    error: {}", error);
        }
    }
    Ok(())
}
