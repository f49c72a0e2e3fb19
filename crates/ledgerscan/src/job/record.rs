use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::extract::ExtractionResult;

/// Lifecycle status of an OCR job. Transitions are strictly forward-only:
/// `Pending -> Processing -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// One unit of OCR work, tracked from enqueue to a terminal state.
///
/// The record is mutated only by the dispatch service at enqueue time and by
/// the single worker that picked the job up, so the transition methods below
/// are the only write surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrJob {
    /// Externally addressable job identifier.
    pub job_id: String,
    /// Internal store-assigned record id, distinct from `job_id`.
    pub record_id: i64,
    pub organization_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Original filename as uploaded.
    pub filename: String,
    /// Storage key of the uploaded file.
    pub storage_key: String,
    /// Declared MIME type, detected from the filename when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub byte_size: u64,
    pub status: JobStatus,
    /// Coarse progress, 0-100, monotonically non-decreasing.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl OcrJob {
    pub fn new(
        organization_id: String,
        user_id: Option<String>,
        filename: String,
        storage_key: String,
        mime_type: Option<String>,
        byte_size: u64,
    ) -> Self {
        let mime_type = mime_type.or_else(|| detect_mime_type(&filename));
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            record_id: 0,
            organization_id,
            user_id,
            filename,
            storage_key,
            mime_type,
            byte_size,
            status: JobStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type.as_deref() == Some("application/pdf")
    }

    /// Marks the job as picked up by a worker.
    pub fn mark_processing(&mut self) -> Result<(), WorkerError> {
        self.transition(JobStatus::Processing)?;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.report_progress(10);
        Ok(())
    }

    /// Terminal success: stores the result and pins progress at 100.
    pub fn mark_completed(&mut self, result: ExtractionResult) -> Result<(), WorkerError> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(result);
        self.error = None;
        self.progress = 100;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Terminal failure: stores the error text; progress stays at the last
    /// reported value.
    pub fn mark_failed(&mut self, error: String) -> Result<(), WorkerError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        self.result = None;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Progress is monotonic for a job's lifetime; lower values are ignored
    /// rather than rejected, so redelivered checkpoints are harmless.
    pub fn report_progress(&mut self, progress: u8) {
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), WorkerError> {
        if !self.status.can_transition_to(next) {
            return Err(WorkerError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Detects MIME type from the filename using the mime_guess crate.
/// Returns `None` for unknown extensions.
fn detect_mime_type(filename: &str) -> Option<String> {
    mime_guess::from_path(filename).first().map(|m| m.to_string())
}
