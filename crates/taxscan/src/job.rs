//! Job record and lifecycle states.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Status of an OCR job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of OCR work, tracked from submission to terminal state.
///
/// `result` and `error` are mutually exclusive: exactly one is set once the
/// job is done or failed, and both are `None` before that. Transitions go
/// through [`Job::complete`] and [`Job::fail`] so status and payload always
/// move together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Decimal-string identifier, monotonically increasing, never reused.
    pub id: String,
    /// Path of the uploaded source file. The queue owns it and unlinks it
    /// once the job reaches a terminal state.
    pub file_path: PathBuf,
    /// User-supplied file name. Informational only.
    pub original_name: String,
    /// Identifier of the submitting user, if any. Access checks live in the
    /// HTTP layer.
    pub owner_id: Option<String>,
    pub status: JobStatus,
    /// Extracted text, set only on `done`. May be the empty string.
    pub result: Option<String>,
    /// Failure description, set only on `failed`.
    pub error: Option<String>,
    /// Submission time, epoch milliseconds.
    pub created_at: i64,
    /// MIME type guessed from the original name. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Job {
    pub fn new(id: String, file_path: PathBuf, original_name: &str, owner_id: Option<&str>) -> Self {
        Self {
            id,
            file_path,
            original_name: original_name.to_string(),
            owner_id: owner_id.map(|s| s.to_string()),
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: Utc::now().timestamp_millis(),
            mime_type: detect_mime_type(Path::new(original_name)),
        }
    }

    /// Marks the job as picked up by a worker.
    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
    }

    /// Marks the job done with the extracted text.
    pub fn complete(&mut self, text: String) {
        self.status = JobStatus::Done;
        self.result = Some(text);
        self.error = None;
    }

    /// Marks the job failed with a human-readable description.
    pub fn fail(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.result = None;
    }

    /// Returns true once the job is done or failed. Terminal jobs never
    /// transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Done | JobStatus::Failed)
    }

    /// Resets a job interrupted by a restart so it can be dispatched again.
    /// Whatever progress the previous process made is lost.
    pub fn reset_for_retry(&mut self) {
        self.status = JobStatus::Queued;
        self.result = None;
        self.error = None;
    }
}

/// Detects MIME type from a file name using the mime_guess crate.
/// Returns `None` for unknown extensions.
fn detect_mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}
