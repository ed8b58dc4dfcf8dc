//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::quality::DEFAULT_PASS_THRESHOLD;

/// Default quality-driven refine attempts per task.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default article body length in words.
pub const DEFAULT_TARGET_LENGTH: usize = 1200;

/// Default number of tasks allowed to run concurrently.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;

/// Errors from invalid pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// max_retries must be at least 1.
    #[error("max_retries must be at least 1, got {0}")]
    InvalidMaxRetries(u32),

    /// Threshold outside the scoring scale.
    #[error("quality_threshold must be within 0.0..=10.0, got {0}")]
    InvalidThreshold(f64),

    /// Target length of zero.
    #[error("target_length must be positive")]
    InvalidTargetLength,

    /// Concurrency of zero.
    #[error("max_concurrent_tasks must be at least 1")]
    InvalidConcurrency,

    /// A timeout of zero.
    #[error("timeout for {0} must be non-zero")]
    InvalidTimeout(&'static str),
}

/// Configuration for the pipeline orchestrator.
///
/// Every external-collaborator call has an explicit timeout; the
/// defaults range from 30s for fast calls (scoring, image search) to
/// 90s for full-body generation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound on quality-driven refine attempts (and on per-stage
    /// collaborator retries for the critical stages).
    pub max_retries: u32,
    /// Overall score required to pass the quality gate.
    pub quality_threshold: f64,
    /// Target article body length in words.
    pub target_length: usize,
    /// Approval type attached to the finalize transition.
    pub approval_type: String,
    /// Maximum tasks running their pipelines at once.
    pub max_concurrent_tasks: usize,
    /// Timeout for one research call.
    pub research_timeout: Duration,
    /// Timeout for one draft call.
    pub draft_timeout: Duration,
    /// Timeout for one scoring call.
    pub scoring_timeout: Duration,
    /// Timeout for one refine call.
    pub refine_timeout: Duration,
    /// Timeout for one image search.
    pub image_timeout: Duration,
    /// Timeout for one metadata-generation call.
    pub metadata_timeout: Duration,
    /// Directory for outcome capture; `None` disables capture.
    pub capture_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            quality_threshold: DEFAULT_PASS_THRESHOLD,
            target_length: DEFAULT_TARGET_LENGTH,
            approval_type: "editorial".to_string(),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            research_timeout: Duration::from_secs(60),
            draft_timeout: Duration::from_secs(90),
            scoring_timeout: Duration::from_secs(30),
            refine_timeout: Duration::from_secs(90),
            image_timeout: Duration::from_secs(30),
            metadata_timeout: Duration::from_secs(30),
            capture_path: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the refine/retry bound.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the quality gate threshold.
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Sets the target body length.
    pub fn with_target_length(mut self, target_length: usize) -> Self {
        self.target_length = target_length;
        self
    }

    /// Sets the approval type used at finalize.
    pub fn with_approval_type(mut self, approval_type: impl Into<String>) -> Self {
        self.approval_type = approval_type.into();
        self
    }

    /// Sets the concurrency bound.
    pub fn with_max_concurrent_tasks(mut self, max_concurrent_tasks: usize) -> Self {
        self.max_concurrent_tasks = max_concurrent_tasks;
        self
    }

    /// Enables outcome capture under the given directory.
    pub fn with_capture_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.capture_path = Some(path.into());
        self
    }

    /// Applies one timeout to every collaborator call (tests).
    pub fn with_uniform_timeout(mut self, timeout: Duration) -> Self {
        self.research_timeout = timeout;
        self.draft_timeout = timeout;
        self.scoring_timeout = timeout;
        self.refine_timeout = timeout;
        self.image_timeout = timeout;
        self.metadata_timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(self.max_retries));
        }
        if !(0.0..=10.0).contains(&self.quality_threshold) {
            return Err(ConfigError::InvalidThreshold(self.quality_threshold));
        }
        if self.target_length == 0 {
            return Err(ConfigError::InvalidTargetLength);
        }
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        let timeouts = [
            ("research", self.research_timeout),
            ("draft", self.draft_timeout),
            ("scoring", self.scoring_timeout),
            ("refine", self.refine_timeout),
            ("image", self.image_timeout),
            ("metadata", self.metadata_timeout),
        ];
        for (name, timeout) in timeouts {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert!((config.quality_threshold - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_max_retries_rejected() {
        let config = PipelineConfig::new().with_max_retries(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxRetries(0))
        ));
    }

    #[test]
    fn test_out_of_scale_threshold_rejected() {
        let config = PipelineConfig::new().with_quality_threshold(11.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = PipelineConfig::new().with_uniform_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_builder_chain() {
        let config = PipelineConfig::new()
            .with_max_retries(5)
            .with_quality_threshold(8.0)
            .with_approval_type("legal")
            .with_capture_path("/tmp/outcomes");

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.approval_type, "legal");
        assert!(config.capture_path.is_some());
    }
}
