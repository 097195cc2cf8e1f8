//! The `Commit` entity (§3): an immutable snapshot binding a manifest to a
//! dataset, with a parent pointer. `commit_id` is content-derived — see
//! `crate::commit_builder` for the derivation itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::CommitId;
use crate::model::dataset::DatasetId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub commit_id: CommitId,
    pub dataset_id: DatasetId,
    pub parent_commit_id: Option<CommitId>,
    pub message: String,
    pub author_id: i64,
    pub committed_at: DateTime<Utc>,
}

/// One row of commit history (§4.5/SPEC_FULL "commit history traversal"),
/// annotated with the row count the recursive-CTE query computes alongside
/// the commit itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitHistoryEntry {
    pub commit: Commit,
    pub row_count: u64,
}
