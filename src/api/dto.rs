//! Request/response shapes for the HTTP adapter. Kept separate from
//! `crate::model` because these are wire contracts, not the entities the
//! core operates on — a field rename here should never ripple into the
//! storage layer and vice versa.

use serde::{Deserialize, Serialize};

use crate::hash::CommitId;
use crate::model::{Commit, CommitHistoryEntry, Dataset, Job, Ref, TableKey, TableSchema};
use crate::model::dataset::DatasetId;
use crate::table_reader::TableRow;

#[derive(Debug, Deserialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    pub description: String,
    pub created_by: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    pub id: DatasetId,
    pub name: String,
    pub description: String,
    pub created_by: i64,
    pub tags: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Dataset> for DatasetResponse {
    fn from(d: Dataset) -> Self {
        DatasetResponse {
            id: d.id,
            name: d.name,
            description: d.description,
            created_by: d.created_by,
            tags: d.tags,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatasetListResponse {
    pub datasets: Vec<DatasetResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRefRequest {
    pub name: String,
    pub commit_id: Option<CommitId>,
}

#[derive(Debug, Serialize)]
pub struct RefResponse {
    pub name: String,
    pub commit_id: Option<CommitId>,
}

impl From<Ref> for RefResponse {
    fn from(r: Ref) -> Self {
        RefResponse {
            name: r.name,
            commit_id: r.commit_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefListResponse {
    pub refs: Vec<RefResponse>,
}

/// Moves `name` to an already-existing `commit_id` via CAS (§4.4), used for
/// both post-import convenience and an explicit "checkout" of a commit the
/// caller already knows about (§6 "checkout a commit").
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub expected_commit_id: Option<CommitId>,
    pub commit_id: CommitId,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub advanced: bool,
}

/// Query string for a multipart import enqueue (the file itself arrives as
/// a multipart field; these are the sibling form fields, §4.8 step 2).
#[derive(Debug, Deserialize)]
pub struct EnqueueImportFields {
    pub target_ref: String,
    pub commit_message: String,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct EnqueueImportResponse {
    pub job_id: uuid::Uuid,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: uuid::Uuid,
    pub run_type: &'static str,
    pub status: &'static str,
    pub dataset_id: DatasetId,
    pub output_summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Job> for JobResponse {
    fn from(j: Job) -> Self {
        JobResponse {
            job_id: j.job_id,
            run_type: j.run_type.as_str(),
            status: j.status.as_str(),
            dataset_id: j.dataset_id,
            output_summary: j.output_summary,
            error_message: j.error_message,
            created_at: j.created_at,
            completed_at: j.completed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    100
}

#[derive(Debug, Serialize)]
pub struct CommitHistoryResponse {
    pub entries: Vec<CommitHistoryEntryResponse>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct CommitHistoryEntryResponse {
    pub commit: Commit,
    pub row_count: u64,
}

impl From<CommitHistoryEntry> for CommitHistoryEntryResponse {
    fn from(e: CommitHistoryEntry) -> Self {
        CommitHistoryEntryResponse {
            commit: e.commit,
            row_count: e.row_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub tables: Vec<TableKey>,
}

#[derive(Debug, Serialize)]
pub struct TableSchemaResponse {
    pub schema: TableSchema,
}

#[derive(Debug, Serialize)]
pub struct TableDataResponse {
    pub rows: Vec<TableRowResponse>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct TableRowResponse {
    pub logical_row_id: String,
    pub row_hash: String,
    pub data: serde_json::Value,
}

impl From<TableRow> for TableRowResponse {
    fn from(r: TableRow) -> Self {
        TableRowResponse {
            logical_row_id: r.logical_row_id.to_string(),
            row_hash: r.row.row_hash.to_hex(),
            data: r.row.data,
        }
    }
}

/// One ref's current commit plus its per-table row counts, the unit the
/// dataset-overview endpoint returns one of per ref (SPEC_FULL "bulk
/// dataset-overview metadata").
#[derive(Debug, Serialize)]
pub struct RefOverview {
    pub ref_name: String,
    pub commit_id: Option<CommitId>,
    pub tables: Vec<TableOverview>,
}

#[derive(Debug, Serialize)]
pub struct TableOverview {
    pub table_key: TableKey,
    pub row_count: u64,
}

#[derive(Debug, Serialize)]
pub struct DatasetOverviewResponse {
    pub dataset_id: DatasetId,
    pub refs: Vec<RefOverview>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
