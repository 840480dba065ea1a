//! Job tracking types
//!
//! A Job tracks one asynchronous pipeline execution; a BatchJob tracks many
//! independent per-file sub-pipelines. Both are value snapshots: clients
//! poll, nothing pushes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job state machine: pending -> running -> success | failed.
/// Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Failure taxonomy surfaced to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TransientProvider,
    PermanentProvider,
    Normalization,
    Storage,
    Export,
    Timeout,
}

/// Structured error payload carried by failed jobs and sub-results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,

    /// Whether submitting the same request again could plausibly succeed
    pub retryable: bool,
}

/// One tracked asynchronous pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed_files: usize,

    /// Human-readable progress or error text
    pub message: Option<String>,

    /// Structured error payload, set when failed
    pub detail: Option<FailureDetail>,

    /// The generated plan, set when successful
    pub plan_id: Option<String>,

    /// Opaque export document reference, set when an exporter ran
    pub export_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job for the given number of input files
    pub fn new(total_files: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().simple().to_string(),
            status: JobStatus::Pending,
            total_files,
            processed_files: 0,
            message: None,
            detail: None,
            plan_id: None,
            export_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Outcome of one batch member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Success,
    Failed,
}

/// Post-hoc quality signals on a successful batch member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    RoomCountOutOfRange,
    MissingAreaData,
}

/// Per-file result inside a batch, recorded at its submission index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubResult {
    pub file_id: String,
    pub outcome: FileOutcome,
    pub plan_id: Option<String>,
    pub detail: Option<FailureDetail>,
    #[serde(default)]
    pub flags: Vec<QualityFlag>,
}

/// A job composed of many independent per-file sub-pipelines.
///
/// Reaches success once every sub-pipeline is terminal regardless of
/// individual outcomes; failed is reserved for orchestration-level faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub message: Option<String>,
    pub detail: Option<FailureDetail>,

    /// Slots in file-submission order, filled as sub-pipelines complete
    pub sub_results: Vec<Option<SubResult>>,

    pub success_count: usize,
    pub failure_count: usize,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchJob {
    /// Create a pending batch with one pre-sized slot per file
    pub fn new(total_files: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().simple().to_string(),
            status: JobStatus::Pending,
            total_files,
            processed_files: 0,
            message: None,
            detail: None,
            sub_results: vec![None; total_files],
            success_count: 0,
            failure_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of sub-results recorded so far
    pub fn terminal_sub_results(&self) -> usize {
        self.sub_results.iter().flatten().count()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_starts_pending() {
        let job = Job::new(3);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.total_files, 3);
        assert_eq!(job.processed_files, 0);
        assert!(job.plan_id.is_none());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&JobStatus::Success).unwrap(), "\"success\"");
        assert_eq!(
            serde_json::to_string(&FailureKind::TransientProvider).unwrap(),
            "\"transient_provider\""
        );
        assert_eq!(
            serde_json::to_string(&QualityFlag::RoomCountOutOfRange).unwrap(),
            "\"room_count_out_of_range\""
        );
    }

    #[test]
    fn test_batch_presizes_slots() {
        let batch = BatchJob::new(5);
        assert_eq!(batch.sub_results.len(), 5);
        assert!(batch.sub_results.iter().all(Option::is_none));
        assert_eq!(batch.terminal_sub_results(), 0);
    }
}
