//! Prompt-driven collaborator implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::collaborators::{
    ArticleMetadata, CollaboratorError, DraftRequest, Drafter, ImageFinder, MetadataGenerator,
    Refiner, Researcher, Scorer,
};
use crate::quality::{DimensionScore, FeedbackItem, QualityDimension};

use super::client::{ChatClient, LlmError};

const RESEARCH_SYSTEM: &str = "You are a research assistant for a content team. \
Given a topic and a writing style, produce concise background notes: key facts, \
angles worth covering, and common misconceptions. Plain text only.";

const DRAFT_SYSTEM: &str = "You are a professional content writer. Write a complete \
article body from the provided research notes, matching the requested style, tone \
and approximate length. Return only the article text.";

const REFINE_SYSTEM: &str = "You are an editor revising a draft. Apply every piece \
of feedback while preserving the draft's structure and voice. Return only the \
revised article text.";

const SCORE_SYSTEM: &str = "You are a strict content quality reviewer. Score the \
text on each requested dimension from 0 to 10 and give a short improvement \
suggestion for any dimension below 8. Respond with JSON only, shaped as \
{\"scores\": [{\"dimension\": \"clarity\", \"score\": 7.5, \"suggestion\": \"...\"}]}.";

const METADATA_SYSTEM: &str = "You are an SEO specialist. Derive a title, a summary \
of at most 160 characters, and 5-8 keywords from the article. Respond with JSON \
only, shaped as {\"title\": \"...\", \"summary\": \"...\", \"keywords\": [\"...\"]}.";

/// Extracts the first JSON object or array from a model response.
///
/// Handles answers wrapped in markdown code fences or surrounded by
/// explanatory text by bracket-matching from the first opening brace.
pub fn extract_json(response: &str) -> Option<&str> {
    let start = response.find(['{', '['])?;
    let open = response.as_bytes()[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in response.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match *byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn map_llm_err(collaborator: &'static str, error: LlmError) -> CollaboratorError {
    match error {
        LlmError::EmptyResponse => CollaboratorError::Malformed {
            collaborator,
            detail: error.to_string(),
        },
        other => CollaboratorError::Unavailable {
            collaborator,
            detail: other.to_string(),
        },
    }
}

/// All chat-based collaborators in one handle.
///
/// One struct implements every trait so a single client/model pair can
/// back the whole pipeline; tests swap individual fakes instead.
pub struct LlmCollaborators {
    client: Arc<ChatClient>,
}

impl LlmCollaborators {
    /// Creates collaborator implementations over the given client.
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Researcher for LlmCollaborators {
    async fn research(&self, topic: &str, style: &str) -> Result<String, CollaboratorError> {
        let prompt = format!("Topic: {}\nStyle: {}", topic, style);
        self.client
            .complete(RESEARCH_SYSTEM, &prompt, 0.7, 2000)
            .await
            .map_err(|e| map_llm_err("researcher", e))
    }
}

#[async_trait]
impl Drafter for LlmCollaborators {
    async fn draft(&self, request: DraftRequest<'_>) -> Result<String, CollaboratorError> {
        let prompt = format!(
            "Topic: {}\nStyle: {}\nTone: {}\nTarget length: about {} words\n\nResearch notes:\n{}",
            request.topic, request.style, request.tone, request.target_length, request.research
        );
        self.client
            .complete(DRAFT_SYSTEM, &prompt, 0.8, 4000)
            .await
            .map_err(|e| map_llm_err("drafter", e))
    }
}

#[async_trait]
impl Refiner for LlmCollaborators {
    async fn refine(
        &self,
        draft: &str,
        feedback: &[FeedbackItem],
    ) -> Result<String, CollaboratorError> {
        let feedback_lines: Vec<String> = feedback
            .iter()
            .map(|f| format!("- {}: {}", f.dimension, f.suggestion))
            .collect();
        let prompt = format!(
            "Feedback:\n{}\n\nDraft:\n{}",
            feedback_lines.join("\n"),
            draft
        );
        self.client
            .complete(REFINE_SYSTEM, &prompt, 0.6, 4000)
            .await
            .map_err(|e| map_llm_err("refiner", e))
    }
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    scores: Vec<ScoreEntry>,
}

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    dimension: String,
    score: f64,
    suggestion: Option<String>,
}

#[async_trait]
impl Scorer for LlmCollaborators {
    async fn score(
        &self,
        text: &str,
        dimensions: &[QualityDimension],
    ) -> Result<Vec<DimensionScore>, CollaboratorError> {
        let names: Vec<&str> = dimensions.iter().map(|d| d.as_str()).collect();
        let prompt = format!("Dimensions: {}\n\nText:\n{}", names.join(", "), text);
        let response = self
            .client
            .complete(SCORE_SYSTEM, &prompt, 0.2, 1500)
            .await
            .map_err(|e| map_llm_err("scorer", e))?;

        let json = extract_json(&response).ok_or_else(|| CollaboratorError::Malformed {
            collaborator: "scorer",
            detail: "no JSON found in response".to_string(),
        })?;
        let parsed: ScoreResponse =
            serde_json::from_str(json).map_err(|e| CollaboratorError::Malformed {
                collaborator: "scorer",
                detail: e.to_string(),
            })?;

        // Unknown dimension names from the model are dropped rather
        // than failing the whole score.
        let scores: Vec<DimensionScore> = parsed
            .scores
            .into_iter()
            .filter_map(|entry| {
                let dimension: QualityDimension = entry.dimension.parse().ok()?;
                let score = DimensionScore::new(dimension, entry.score);
                Some(match entry.suggestion {
                    Some(s) if !s.trim().is_empty() => score.with_suggestion(s),
                    _ => score,
                })
            })
            .collect();

        if scores.is_empty() {
            return Err(CollaboratorError::Malformed {
                collaborator: "scorer",
                detail: "no recognizable dimension scores in response".to_string(),
            });
        }

        Ok(scores)
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    title: String,
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[async_trait]
impl MetadataGenerator for LlmCollaborators {
    async fn generate(&self, body: &str) -> Result<ArticleMetadata, CollaboratorError> {
        let response = self
            .client
            .complete(METADATA_SYSTEM, body, 0.3, 600)
            .await
            .map_err(|e| map_llm_err("metadata_generator", e))?;

        let json = extract_json(&response).ok_or_else(|| CollaboratorError::Malformed {
            collaborator: "metadata_generator",
            detail: "no JSON found in response".to_string(),
        })?;
        let parsed: MetadataResponse =
            serde_json::from_str(json).map_err(|e| CollaboratorError::Malformed {
                collaborator: "metadata_generator",
                detail: e.to_string(),
            })?;

        Ok(ArticleMetadata {
            title: parsed.title,
            summary: parsed.summary,
            keywords: parsed.keywords,
        })
    }
}

/// Image search backed by the Openverse API (no API key required).
pub struct OpenverseImageFinder {
    http_client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct OpenverseResponse {
    results: Vec<OpenverseResult>,
}

#[derive(Debug, Deserialize)]
struct OpenverseResult {
    url: String,
}

impl OpenverseImageFinder {
    /// Creates a finder against the public Openverse endpoint.
    pub fn new() -> Result<Self, CollaboratorError> {
        Self::with_api_base("https://api.openverse.org")
    }

    /// Creates a finder against a custom endpoint (tests).
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CollaboratorError::Unavailable {
                collaborator: "image_finder",
                detail: e.to_string(),
            })?;
        Ok(Self {
            http_client,
            api_base: api_base.into(),
        })
    }
}

#[async_trait]
impl ImageFinder for OpenverseImageFinder {
    async fn find(&self, topic: &str) -> Result<Option<String>, CollaboratorError> {
        let url = format!("{}/v1/images/", self.api_base);
        let response = self
            .http_client
            .get(&url)
            .query(&[("q", topic), ("page_size", "1")])
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable {
                collaborator: "image_finder",
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Unavailable {
                collaborator: "image_finder",
                detail: format!("search returned status {}", response.status()),
            });
        }

        let parsed: OpenverseResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::Malformed {
                    collaborator: "image_finder",
                    detail: e.to_string(),
                })?;

        Ok(parsed.results.into_iter().next().map(|r| r.url))
    }
}
