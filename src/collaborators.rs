//! Narrow interfaces for the external collaborators the pipeline calls.
//!
//! Each trait is one swappable seam: an LLM call, an image search, a
//! content scorer. Production implementations live in [`crate::llm`];
//! tests inject deterministic fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quality::{DimensionScore, FeedbackItem, QualityDimension};

/// Errors from external collaborator calls.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The call did not return within its timeout.
    #[error("{collaborator} call timed out after {timeout:?}")]
    Timeout {
        collaborator: &'static str,
        timeout: Duration,
    },

    /// The collaborator answered, but the response could not be used.
    #[error("{collaborator} returned a malformed response: {detail}")]
    Malformed {
        collaborator: &'static str,
        detail: String,
    },

    /// The collaborator was unreachable or failed outright.
    #[error("{collaborator} failed: {detail}")]
    Unavailable {
        collaborator: &'static str,
        detail: String,
    },
}

/// Inputs for one drafting call.
#[derive(Debug, Clone)]
pub struct DraftRequest<'a> {
    /// Background research text.
    pub research: &'a str,
    /// Topic of the article.
    pub topic: &'a str,
    /// Writing style.
    pub style: &'a str,
    /// Writing tone.
    pub tone: &'a str,
    /// Target body length in words.
    pub target_length: usize,
}

/// SEO metadata derived from a finished body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleMetadata {
    /// Article title.
    pub title: String,
    /// Short summary.
    pub summary: String,
    /// Keywords.
    pub keywords: Vec<String>,
}

/// Produces background research for a topic.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Returns research notes for the topic in the given style.
    async fn research(&self, topic: &str, style: &str) -> Result<String, CollaboratorError>;
}

/// Produces a full article body.
#[async_trait]
pub trait Drafter: Send + Sync {
    /// Drafts a body from research and style parameters.
    async fn draft(&self, request: DraftRequest<'_>) -> Result<String, CollaboratorError>;
}

/// Scores a text along the requested quality dimensions.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Returns one score (0-10) per requested dimension, optionally with
    /// an improvement suggestion.
    async fn score(
        &self,
        text: &str,
        dimensions: &[QualityDimension],
    ) -> Result<Vec<DimensionScore>, CollaboratorError>;
}

/// Revises a draft using quality feedback.
#[async_trait]
pub trait Refiner: Send + Sync {
    /// Returns a revised draft addressing the feedback.
    async fn refine(&self, draft: &str, feedback: &[FeedbackItem])
        -> Result<String, CollaboratorError>;
}

/// Locates an image for a topic.
#[async_trait]
pub trait ImageFinder: Send + Sync {
    /// Returns an opaque image reference, or `None` when nothing fits.
    async fn find(&self, topic: &str) -> Result<Option<String>, CollaboratorError>;
}

/// Derives title/summary/keywords from a finished body.
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    /// Generates SEO metadata for the body.
    async fn generate(&self, body: &str) -> Result<ArticleMetadata, CollaboratorError>;
}
