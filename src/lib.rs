//! contentforge: Task pipeline orchestrator for content generation.
//!
//! This library drives content tasks through a staged generation
//! pipeline and guards every status change with a validated, audited
//! state machine.

// Core modules
pub mod audit;
pub mod capture;
pub mod cli;
pub mod collaborators;
pub mod lifecycle;
pub mod llm;
pub mod pipeline;
pub mod quality;
pub mod storage;
pub mod task;

// Re-export the types most callers touch
pub use lifecycle::{ServiceError, StatusChangeOutcome, StatusChangeRequest, StatusChangeService};
pub use pipeline::{PipelineConfig, PipelineError, PipelineOrchestrator};
pub use task::{Task, TaskStatus};
