//! Quality gating between the draft and refine stages.
//!
//! The gate averages per-dimension scores from an external scorer
//! against a configured threshold and produces structured feedback for
//! the refine stage when the draft falls short.

mod evaluation;
mod gate;

pub use evaluation::{DimensionScore, FeedbackItem, QualityDimension, QualityEvaluation};
pub use gate::{QualityGate, DEFAULT_PASS_THRESHOLD};
