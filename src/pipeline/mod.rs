//! Pipeline orchestration for content-generation tasks.
//!
//! This module provides the `PipelineOrchestrator` that drives one task
//! through research, drafting, the quality-gated refine loop, image
//! sourcing, metadata generation and finalization, transitioning the
//! task's status through the lifecycle service at each boundary.

mod config;
mod orchestrator;

pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{
    Collaborators, PipelineError, PipelineOrchestrator, PipelineRun, PipelineStage, PipelineStats,
    RunOutcome,
};
