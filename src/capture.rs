//! Outcome capture for finished pipeline runs.
//!
//! Writes one JSON line per finished run to a local file so the results
//! can be fed back into training or analysis later. The finalize stage
//! invokes this fire-and-forget: capture failure must never fail the
//! task, callers log the error and move on.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::task::TaskStatus;

/// File the outcome lines are appended to.
const OUTCOMES_FILE: &str = "outcomes.jsonl";

/// Errors that can occur while capturing outcomes.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Failed to read or write the outcomes file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize an outcome record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One captured pipeline outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Task the run belonged to.
    pub task_id: Uuid,
    /// Topic that was generated.
    pub topic: String,
    /// Status the task ended the run in.
    pub final_status: TaskStatus,
    /// Refine attempts consumed.
    pub refine_attempts: u32,
    /// Best overall quality score observed.
    pub best_score: Option<f64>,
    /// Whether the quality gate ever passed.
    pub gate_passed: bool,
    /// Non-fatal problems recorded during the run.
    pub warnings: Vec<String>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
}

/// Appends outcome records to a JSONL file.
pub struct OutcomeCapture {
    base_path: PathBuf,
}

impl OutcomeCapture {
    /// Creates a capture writer rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Returns the path of the outcomes file.
    pub fn outcomes_path(&self) -> PathBuf {
        self.base_path.join(OUTCOMES_FILE)
    }

    /// Appends one outcome record, returning the file path written to.
    pub async fn append(&self, record: &OutcomeRecord) -> Result<PathBuf, CaptureError> {
        self.ensure_directory().await?;

        let path = self.outcomes_path();
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(path)
    }

    /// Loads all captured outcomes, skipping unparseable lines.
    pub async fn load_all(&self) -> Result<Vec<OutcomeRecord>, CaptureError> {
        let path = self.outcomes_path();
        if !Path::new(&path).exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    async fn ensure_directory(&self) -> Result<(), CaptureError> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(topic: &str) -> OutcomeRecord {
        OutcomeRecord {
            task_id: Uuid::new_v4(),
            topic: topic.to_string(),
            final_status: TaskStatus::AwaitingApproval,
            refine_attempts: 2,
            best_score: Some(6.4),
            gate_passed: false,
            warnings: vec!["image sourcing failed".to_string()],
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_load_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let capture = OutcomeCapture::new(dir.path());

        capture.append(&record("first")).await.expect("append");
        capture.append(&record("second")).await.expect("append");

        let loaded = capture.load_all().await.expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].topic, "first");
        assert_eq!(loaded[1].topic, "second");
    }

    #[tokio::test]
    async fn test_load_from_missing_file_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let capture = OutcomeCapture::new(dir.path().join("nested"));
        assert!(capture.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let capture = OutcomeCapture::new(dir.path());
        capture.append(&record("good")).await.expect("append");

        tokio::fs::write(
            capture.outcomes_path(),
            "not json\n{\"also\": \"not an outcome\"}\n",
        )
        .await
        .expect("write");
        capture.append(&record("after")).await.expect("append");

        let loaded = capture.load_all().await.expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].topic, "after");
    }
}
