//! Storage capability records (§9 "capability records"): one async trait
//! per component named in §4.2-§4.4/§4.7, each implemented once against
//! Postgres via `sea_orm`'s raw-SQL path (`postgres.rs`) and once in-memory
//! for dependency-free unit tests (`fakes`, test-only).
//!
//! These are genuinely small interfaces, not a deep service hierarchy: the
//! versioning core depends on them by trait object, never on the concrete
//! Postgres type, so `CommitBuilder`/`TableReader`/`ImportWorker` are
//! testable without a database.

mod postgres;

#[cfg(test)]
pub mod fakes;

pub use postgres::PgStore;

use async_trait::async_trait;

use crate::errors::Result;
use crate::hash::{CommitId, RowHash};
use crate::model::{
    Commit, CommitHistoryEntry, CommitSchema, Dataset, Job, JobStatus, LogicalRowId,
    ManifestEntry, Ref, Row, RunType, TableKey, TableSchema,
};
use crate::model::dataset::DatasetId;

/// The dataset scope boundary (§1 "out of scope... creation/deletion are
/// external responsibilities"). Kept here only because the HTTP adapter
/// (§6) needs somewhere to create the `dataset_id` every other store keys
/// on; it does not participate in the versioning protocol itself.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn create(&self, name: String, description: String, created_by: i64, tags: Vec<String>) -> Result<Dataset>;
    async fn get(&self, dataset_id: DatasetId) -> Result<Option<Dataset>>;
    async fn list(&self) -> Result<Vec<Dataset>>;
}

/// §4.2: content-addressed key->blob map, insert-idempotent.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn upsert_rows(&self, rows: &[Row]) -> Result<()>;
    async fn exists(&self, hash: &RowHash) -> Result<bool>;
    async fn fetch(&self, hashes: &[RowHash]) -> Result<Vec<Row>>;
}

/// The three inserts of §4.3 step 5, grouped so the implementation can make
/// them atomic (via `TransactionScope` for Postgres, via a single mutex
/// guard for the in-memory fake).
#[async_trait]
pub trait AtomicCommitWriter: Send + Sync {
    async fn write_commit(
        &self,
        commit: &Commit,
        manifest: &[ManifestEntry],
        schema: &CommitSchema,
    ) -> Result<()>;
}

/// §4.3/§3: read access to commits once written.
#[async_trait]
pub trait CommitStore: Send + Sync {
    async fn get(&self, commit_id: &CommitId) -> Result<Option<Commit>>;
    async fn exists(&self, commit_id: &CommitId) -> Result<bool>;
    /// Recursive walk of the parent chain starting at `ref_name`'s current
    /// commit, newest first (SPEC_FULL "commit history traversal").
    async fn history(
        &self,
        dataset_id: DatasetId,
        ref_name: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<CommitHistoryEntry>>;
    async fn count_ancestors(&self, dataset_id: DatasetId, ref_name: &str) -> Result<u64>;
}

/// §4.5: manifest-side reads that back the table reader.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    async fn list_table_keys(&self, commit_id: &CommitId) -> Result<Vec<TableKey>>;
    async fn count_rows(&self, commit_id: &CommitId, table_key: &TableKey) -> Result<u64>;
    /// Rows ordered by `(table_key, index)` (§4.5 "ordering rules"), joined
    /// against the Row Store, `offset`/`limit` applied.
    async fn page(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<(LogicalRowId, Row)>>;
    /// Bulk `(commit_id, table_key) -> row_count` for overview endpoints
    /// (SPEC_FULL "bulk dataset-overview metadata").
    async fn batch_row_counts(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<(CommitId, TableKey, u64)>>;
}

/// §3/§4.5: one schema record per commit.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn get(&self, commit_id: &CommitId) -> Result<Option<CommitSchema>>;
    async fn table_schema(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
    ) -> Result<Option<TableSchema>>;
}

/// §4.4: named mutable pointers with compare-and-swap semantics.
#[async_trait]
pub trait RefStore: Send + Sync {
    async fn create_ref(
        &self,
        dataset_id: DatasetId,
        name: &str,
        commit_id: Option<CommitId>,
    ) -> Result<()>;
    async fn get_ref(&self, dataset_id: DatasetId, name: &str) -> Result<Option<Ref>>;
    async fn compare_and_set(
        &self,
        dataset_id: DatasetId,
        name: &str,
        expected: Option<CommitId>,
        new_commit: CommitId,
    ) -> Result<bool>;
    async fn list_refs(&self, dataset_id: DatasetId) -> Result<Vec<Ref>>;
    async fn delete_ref(&self, dataset_id: DatasetId, name: &str) -> Result<bool>;
}

/// §4.7: the job queue, with `SKIP LOCKED`-equivalent acquisition.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        run_type: RunType,
        dataset_id: DatasetId,
        user_id: i64,
        source_commit_id: Option<CommitId>,
        run_parameters: serde_json::Value,
    ) -> Result<uuid::Uuid>;
    async fn acquire_next_pending(&self, run_type: Option<RunType>) -> Result<Option<Job>>;
    async fn update_status(
        &self,
        job_id: uuid::Uuid,
        status: JobStatus,
        output_summary: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<()>;
    async fn get(&self, job_id: uuid::Uuid) -> Result<Option<Job>>;
    async fn list_for_dataset(&self, dataset_id: DatasetId, limit: u64) -> Result<Vec<Job>>;
    /// Every job still `running` when the worker starts; used by the
    /// crash-recovery sweep (SPEC_FULL "crash recovery for running jobs").
    async fn list_running(&self) -> Result<Vec<Job>>;
}
