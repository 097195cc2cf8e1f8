//! The `Job` entity (§3, §4.7): a persistent FIFO work unit. `run_parameters`
//! is opaque JSON at the store layer; [`ImportRunParameters`] is the shape the
//! import worker expects to find inside it for `run_type = "import"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::hash::CommitId;
use crate::model::dataset::DatasetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Import,
    Sampling,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Import => "import",
            RunType::Sampling => "sampling",
        }
    }
}

impl std::str::FromStr for RunType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(RunType::Import),
            "sampling" => Ok(RunType::Sampling),
            other => Err(format!("unknown run_type `{other}`")),
        }
    }
}

/// `pending -> running -> {completed, failed}`; no other transitions (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub run_type: RunType,
    pub status: JobStatus,
    pub dataset_id: DatasetId,
    pub user_id: i64,
    pub source_commit_id: Option<CommitId>,
    pub run_parameters: Json,
    pub output_summary: Option<Json>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The `run_parameters` shape an `import` job's worker expects (§4.8 step 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRunParameters {
    pub dataset_id: DatasetId,
    pub target_ref: String,
    pub temp_file_path: String,
    pub filename: String,
    pub commit_message: String,
    pub user_id: i64,
    pub file_size: u64,
}

/// The `output_summary` an import job reports on success (§4.8 step 7,
/// end-to-end scenario 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutputSummary {
    pub commit_id: CommitId,
    pub rows_imported: u64,
    pub tables: std::collections::BTreeMap<String, u64>,
}
