//! Pass/fail gate over external quality scores.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::collaborators::{CollaboratorError, Scorer};

use super::evaluation::{DimensionScore, FeedbackItem, QualityDimension, QualityEvaluation};

/// Default overall score required to pass, on the 0-10 scale.
pub const DEFAULT_PASS_THRESHOLD: f64 = 7.0;

/// Decides whether a draft is good enough to skip refinement.
///
/// The gate holds no retry policy of its own; looping on failure is the
/// orchestrator's job. Given identical scorer output it is
/// deterministic.
pub struct QualityGate {
    scorer: Arc<dyn Scorer>,
    threshold: f64,
    dimensions: Vec<QualityDimension>,
}

impl QualityGate {
    /// Creates a gate scoring all dimensions against the default threshold.
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self {
            scorer,
            threshold: DEFAULT_PASS_THRESHOLD,
            dimensions: QualityDimension::ALL.to_vec(),
        }
    }

    /// Sets the passing threshold, clamped into the 0-10 range.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 10.0);
        self
    }

    /// Restricts scoring to a subset of dimensions.
    pub fn with_dimensions(mut self, dimensions: Vec<QualityDimension>) -> Self {
        if !dimensions.is_empty() {
            self.dimensions = dimensions;
        }
        self
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores one draft attempt and compares it against the threshold.
    ///
    /// Failing evaluations carry one feedback item per below-threshold
    /// dimension, using the scorer's suggestion when it offered one.
    pub async fn evaluate(
        &self,
        task_id: Uuid,
        attempt_number: u32,
        draft: &str,
    ) -> Result<QualityEvaluation, CollaboratorError> {
        let raw_scores = self.scorer.score(draft, &self.dimensions).await?;

        if raw_scores.is_empty() {
            return Err(CollaboratorError::Malformed {
                collaborator: "scorer",
                detail: "no dimension scores returned".to_string(),
            });
        }

        // Re-clamp: the scorer is an external collaborator and its
        // output is not trusted to stay in range.
        let scores: Vec<DimensionScore> = raw_scores
            .into_iter()
            .map(|s| {
                let clamped = DimensionScore::new(s.dimension, s.score);
                match s.suggestion {
                    Some(suggestion) => clamped.with_suggestion(suggestion),
                    None => clamped,
                }
            })
            .collect();

        let overall_score =
            scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64;
        let passing = overall_score >= self.threshold;

        let feedback = if passing {
            Vec::new()
        } else {
            scores
                .iter()
                .filter(|s| s.score < self.threshold)
                .map(|s| FeedbackItem {
                    dimension: s.dimension,
                    suggestion: s.suggestion.clone().unwrap_or_else(|| {
                        format!(
                            "improve {} (scored {:.1}, needs {:.1})",
                            s.dimension, s.score, self.threshold
                        )
                    }),
                })
                .collect()
        };

        Ok(QualityEvaluation {
            id: Uuid::new_v4(),
            task_id,
            attempt_number,
            scores,
            overall_score,
            passing,
            feedback,
            evaluated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Scorer returning a fixed score for every requested dimension.
    struct FixedScorer {
        score: f64,
        suggestion: Option<String>,
    }

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn score(
            &self,
            _text: &str,
            dimensions: &[QualityDimension],
        ) -> Result<Vec<DimensionScore>, CollaboratorError> {
            Ok(dimensions
                .iter()
                .map(|d| {
                    let score = DimensionScore::new(*d, self.score);
                    match &self.suggestion {
                        Some(s) => score.with_suggestion(s.clone()),
                        None => score,
                    }
                })
                .collect())
        }
    }

    fn gate(score: f64) -> QualityGate {
        QualityGate::new(Arc::new(FixedScorer {
            score,
            suggestion: None,
        }))
    }

    #[tokio::test]
    async fn test_passing_draft_has_no_feedback() {
        let evaluation = gate(8.5)
            .evaluate(Uuid::new_v4(), 1, "a strong draft")
            .await
            .expect("evaluate");

        assert!(evaluation.passing);
        assert!((evaluation.overall_score - 8.5).abs() < f64::EPSILON);
        assert!(evaluation.feedback.is_empty());
        assert_eq!(evaluation.scores.len(), QualityDimension::ALL.len());
    }

    #[tokio::test]
    async fn test_failing_draft_gets_feedback_per_weak_dimension() {
        let evaluation = gate(5.0)
            .evaluate(Uuid::new_v4(), 2, "a weak draft")
            .await
            .expect("evaluate");

        assert!(!evaluation.passing);
        assert_eq!(evaluation.feedback.len(), QualityDimension::ALL.len());
        assert!(evaluation.feedback[0].suggestion.contains("improve"));
    }

    #[tokio::test]
    async fn test_scorer_suggestion_is_preferred() {
        let gate = QualityGate::new(Arc::new(FixedScorer {
            score: 4.0,
            suggestion: Some("tighten the intro".to_string()),
        }));

        let evaluation = gate
            .evaluate(Uuid::new_v4(), 1, "draft")
            .await
            .expect("evaluate");

        assert!(evaluation
            .feedback
            .iter()
            .all(|f| f.suggestion == "tighten the intro"));
    }

    #[tokio::test]
    async fn test_threshold_boundary_passes() {
        let evaluation = gate(DEFAULT_PASS_THRESHOLD)
            .evaluate(Uuid::new_v4(), 1, "draft")
            .await
            .expect("evaluate");
        assert!(evaluation.passing);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_clamped() {
        let evaluation = gate(25.0)
            .evaluate(Uuid::new_v4(), 1, "draft")
            .await
            .expect("evaluate");
        assert!((evaluation.overall_score - 10.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_scorer_output_is_malformed() {
        struct EmptyScorer;

        #[async_trait]
        impl Scorer for EmptyScorer {
            async fn score(
                &self,
                _text: &str,
                _dimensions: &[QualityDimension],
            ) -> Result<Vec<DimensionScore>, CollaboratorError> {
                Ok(Vec::new())
            }
        }

        let gate = QualityGate::new(Arc::new(EmptyScorer));
        let result = gate.evaluate(Uuid::new_v4(), 1, "draft").await;
        assert!(matches!(result, Err(CollaboratorError::Malformed { .. })));
    }
}
