//! Quality evaluation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum value a dimension score can take.
pub(crate) const MAX_DIMENSION_SCORE: f64 = 10.0;

/// One scored dimension of content quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    /// How easy the text is to follow.
    Clarity,
    /// Factual correctness.
    Accuracy,
    /// Coverage of the topic.
    Completeness,
    /// Fit between text and topic.
    Relevance,
    /// Search-engine friendliness.
    SeoQuality,
    /// Reading-level appropriateness.
    Readability,
    /// How compelling the text is.
    Engagement,
}

impl QualityDimension {
    /// All dimensions, in the order they are scored.
    pub const ALL: [QualityDimension; 7] = [
        QualityDimension::Clarity,
        QualityDimension::Accuracy,
        QualityDimension::Completeness,
        QualityDimension::Relevance,
        QualityDimension::SeoQuality,
        QualityDimension::Readability,
        QualityDimension::Engagement,
    ];

    /// Wire representation of this dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityDimension::Clarity => "clarity",
            QualityDimension::Accuracy => "accuracy",
            QualityDimension::Completeness => "completeness",
            QualityDimension::Relevance => "relevance",
            QualityDimension::SeoQuality => "seo_quality",
            QualityDimension::Readability => "readability",
            QualityDimension::Engagement => "engagement",
        }
    }
}

impl std::fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QualityDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clarity" => Ok(QualityDimension::Clarity),
            "accuracy" => Ok(QualityDimension::Accuracy),
            "completeness" => Ok(QualityDimension::Completeness),
            "relevance" => Ok(QualityDimension::Relevance),
            "seo_quality" => Ok(QualityDimension::SeoQuality),
            "readability" => Ok(QualityDimension::Readability),
            "engagement" => Ok(QualityDimension::Engagement),
            other => Err(format!("unknown quality dimension '{}'", other)),
        }
    }
}

/// Score for one dimension, as returned by the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    /// The scored dimension.
    pub dimension: QualityDimension,
    /// Score on a 0-10 scale.
    pub score: f64,
    /// Improvement suggestion, if the scorer offered one.
    pub suggestion: Option<String>,
}

impl DimensionScore {
    /// Creates a score, clamping it into the 0-10 range.
    pub fn new(dimension: QualityDimension, score: f64) -> Self {
        Self {
            dimension,
            score: score.clamp(0.0, MAX_DIMENSION_SCORE),
            suggestion: None,
        }
    }

    /// Attaches an improvement suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// One dimension:suggestion pair consumed by the refine stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Dimension that fell short.
    pub dimension: QualityDimension,
    /// What to improve.
    pub suggestion: String,
}

/// Immutable output of the quality gate for one draft attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityEvaluation {
    /// Evaluation identifier.
    pub id: Uuid,
    /// Task whose draft was evaluated.
    pub task_id: Uuid,
    /// 1-based draft/refine attempt number.
    pub attempt_number: u32,
    /// Per-dimension scores.
    pub scores: Vec<DimensionScore>,
    /// Mean of all dimension scores.
    pub overall_score: f64,
    /// Whether the overall score met the configured threshold.
    pub passing: bool,
    /// Suggestions for the refine stage, empty when passing.
    pub feedback: Vec<FeedbackItem>,
    /// When the evaluation happened.
    pub evaluated_at: DateTime<Utc>,
}

impl QualityEvaluation {
    /// Returns the score recorded for one dimension, if present.
    pub fn score_for(&self, dimension: QualityDimension) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.dimension == dimension)
            .map(|s| s.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_dimension_round_trips_through_str() {
        for dimension in QualityDimension::ALL {
            let parsed = QualityDimension::from_str(dimension.as_str()).expect("parse back");
            assert_eq!(parsed, dimension);
        }
    }

    #[test]
    fn test_dimension_score_is_clamped() {
        assert_eq!(DimensionScore::new(QualityDimension::Clarity, 14.0).score, 10.0);
        assert_eq!(DimensionScore::new(QualityDimension::Clarity, -3.0).score, 0.0);
        assert_eq!(DimensionScore::new(QualityDimension::Clarity, 7.5).score, 7.5);
    }

    #[test]
    fn test_score_for_lookup() {
        let evaluation = QualityEvaluation {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            attempt_number: 1,
            scores: vec![
                DimensionScore::new(QualityDimension::Clarity, 8.0),
                DimensionScore::new(QualityDimension::Accuracy, 6.0),
            ],
            overall_score: 7.0,
            passing: true,
            feedback: Vec::new(),
            evaluated_at: Utc::now(),
        };

        assert_eq!(evaluation.score_for(QualityDimension::Accuracy), Some(6.0));
        assert_eq!(evaluation.score_for(QualityDimension::Engagement), None);
    }
}
