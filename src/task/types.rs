//! Task and result payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::TaskStatus;

/// Structured output of a finished pipeline run.
///
/// Populated on the task only once it reaches `awaiting_approval`; a
/// transition into `published` requires it to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentResult {
    /// Article title.
    pub title: String,
    /// Full article body.
    pub body: String,
    /// Short SEO summary.
    pub summary: String,
    /// SEO keywords.
    pub keywords: Vec<String>,
    /// Opaque reference to an attached image, if one was found.
    pub image_reference: Option<String>,
}

impl ContentResult {
    /// Creates a result with the required title and body.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            summary: String::new(),
            keywords: Vec::new(),
            image_reference: None,
        }
    }

    /// Sets the SEO summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Sets the SEO keywords.
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Sets the image reference.
    pub fn with_image_reference(mut self, reference: impl Into<String>) -> Self {
        self.image_reference = Some(reference.into());
        self
    }
}

/// One content-generation request and its lifecycle state.
///
/// Tasks are never hard-deleted; cancellation is itself a terminal
/// status. The `status` field must only be written through
/// `StatusChangeService` so that every change lands in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Topic to write about.
    pub topic: String,
    /// Writing style, passed opaquely to the generators.
    pub style: String,
    /// Writing tone, passed opaquely to the generators.
    pub tone: String,
    /// Generated content, present once the pipeline finalized.
    pub result: Option<ContentResult>,
    /// Number of quality-driven refine attempts consumed.
    pub retry_count: u32,
    /// Non-fatal problems recorded during the pipeline run.
    pub warnings: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task in `pending` status.
    pub fn new(topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            topic: topic.into(),
            style: "informative".to_string(),
            tone: "neutral".to_string(),
            result: None,
            retry_count: 0,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the writing style.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Sets the writing tone.
    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }
}
