//! In-memory test doubles for every store trait, so `CommitBuilder`,
//! `TableReader` and `ImportWorker` can be exercised without Postgres.
//! Each fake guards its state behind one `std::sync::Mutex`; that's the
//! in-memory equivalent of `AtomicCommitWriter`'s transaction and of the
//! job queue's row lock.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{Result, RowledgerError};
use crate::hash::{CommitId, RowHash};
use crate::model::dataset::DatasetId;
use crate::model::{
    Commit, CommitHistoryEntry, CommitSchema, Dataset, Job, JobStatus, LogicalRowId,
    ManifestEntry, Ref, Row, RunType, TableKey, TableSchema,
};

use super::{
    AtomicCommitWriter, CommitStore, DatasetStore, JobQueue, ManifestStore, RefStore, RowStore,
    SchemaStore,
};

#[derive(Default)]
pub struct FakeRowStore {
    rows: Mutex<BTreeMap<RowHash, Row>>,
}

#[async_trait]
impl RowStore for FakeRowStore {
    async fn upsert_rows(&self, rows: &[Row]) -> Result<()> {
        let mut guard = self.rows.lock().unwrap();
        for row in rows {
            guard.entry(row.row_hash).or_insert_with(|| row.clone());
        }
        Ok(())
    }

    async fn exists(&self, hash: &RowHash) -> Result<bool> {
        Ok(self.rows.lock().unwrap().contains_key(hash))
    }

    async fn fetch(&self, hashes: &[RowHash]) -> Result<Vec<Row>> {
        let guard = self.rows.lock().unwrap();
        hashes
            .iter()
            .map(|h| {
                guard
                    .get(h)
                    .cloned()
                    .ok_or_else(|| RowledgerError::not_found("row", h.to_hex()))
            })
            .collect()
    }
}

struct StoredCommit {
    commit: Commit,
    manifest: Vec<ManifestEntry>,
    schema: CommitSchema,
}

/// Backs `AtomicCommitWriter`, `CommitStore`, `ManifestStore` and
/// `SchemaStore` together, the way `PgStore` backs all four against one
/// pool — a commit's manifest/schema never exist without its commit row.
#[derive(Default)]
pub struct FakeCommitStore {
    commits: Mutex<BTreeMap<CommitId, StoredCommit>>,
}

#[async_trait]
impl AtomicCommitWriter for FakeCommitStore {
    async fn write_commit(
        &self,
        commit: &Commit,
        manifest: &[ManifestEntry],
        schema: &CommitSchema,
    ) -> Result<()> {
        let mut guard = self.commits.lock().unwrap();
        guard.insert(
            commit.commit_id,
            StoredCommit {
                commit: commit.clone(),
                manifest: manifest.to_vec(),
                schema: schema.clone(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl CommitStore for FakeCommitStore {
    async fn get(&self, commit_id: &CommitId) -> Result<Option<Commit>> {
        Ok(self
            .commits
            .lock()
            .unwrap()
            .get(commit_id)
            .map(|c| c.commit.clone()))
    }

    async fn exists(&self, commit_id: &CommitId) -> Result<bool> {
        Ok(self.commits.lock().unwrap().contains_key(commit_id))
    }

    async fn history(
        &self,
        dataset_id: DatasetId,
        _ref_name: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<CommitHistoryEntry>> {
        // The fake has no `refs` table of its own; callers in tests walk
        // from a commit_id they already hold via `get`/`count_ancestors`
        // semantics, so history here just filters by dataset and orders
        // newest-first like the real recursive CTE would.
        let guard = self.commits.lock().unwrap();
        let mut entries: Vec<CommitHistoryEntry> = guard
            .values()
            .filter(|c| c.commit.dataset_id == dataset_id)
            .map(|c| CommitHistoryEntry {
                commit: c.commit.clone(),
                row_count: c.manifest.len() as u64,
            })
            .collect();
        entries.sort_by(|a, b| b.commit.committed_at.cmp(&a.commit.committed_at));
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_ancestors(&self, dataset_id: DatasetId, _ref_name: &str) -> Result<u64> {
        Ok(self
            .commits
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.commit.dataset_id == dataset_id)
            .count() as u64)
    }
}

#[async_trait]
impl ManifestStore for FakeCommitStore {
    async fn list_table_keys(&self, commit_id: &CommitId) -> Result<Vec<TableKey>> {
        let guard = self.commits.lock().unwrap();
        let stored = guard
            .get(commit_id)
            .ok_or_else(|| RowledgerError::not_found("commit", commit_id.to_hex()))?;
        if !stored.schema.tables.is_empty() {
            return Ok(stored.schema.table_keys());
        }
        let mut keys: Vec<TableKey> = stored
            .manifest
            .iter()
            .map(|e| e.logical_row_id.table_key.clone())
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn count_rows(&self, commit_id: &CommitId, table_key: &TableKey) -> Result<u64> {
        let guard = self.commits.lock().unwrap();
        let stored = guard
            .get(commit_id)
            .ok_or_else(|| RowledgerError::not_found("commit", commit_id.to_hex()))?;
        Ok(stored
            .manifest
            .iter()
            .filter(|e| &e.logical_row_id.table_key == table_key)
            .count() as u64)
    }

    async fn page(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<(LogicalRowId, Row)>> {
        let guard = self.commits.lock().unwrap();
        let stored = guard
            .get(commit_id)
            .ok_or_else(|| RowledgerError::not_found("commit", commit_id.to_hex()))?;
        let mut entries: Vec<&ManifestEntry> = stored
            .manifest
            .iter()
            .filter(|e| &e.logical_row_id.table_key == table_key)
            .collect();
        entries.sort_by_key(|e| e.logical_row_id.sort_key());
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|e| {
                (
                    e.logical_row_id.clone(),
                    Row::new(e.row_hash, serde_json::Value::Null),
                )
            })
            .collect())
    }

    async fn batch_row_counts(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<(CommitId, TableKey, u64)>> {
        let guard = self.commits.lock().unwrap();
        let mut out = Vec::new();
        for commit_id in commit_ids {
            let Some(stored) = guard.get(commit_id) else {
                continue;
            };
            let mut counts: BTreeMap<TableKey, u64> = BTreeMap::new();
            for entry in &stored.manifest {
                *counts.entry(entry.logical_row_id.table_key.clone()).or_insert(0) += 1;
            }
            for (table_key, n) in counts {
                out.push((*commit_id, table_key, n));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SchemaStore for FakeCommitStore {
    async fn get(&self, commit_id: &CommitId) -> Result<Option<CommitSchema>> {
        Ok(self
            .commits
            .lock()
            .unwrap()
            .get(commit_id)
            .map(|c| c.schema.clone()))
    }

    async fn table_schema(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
    ) -> Result<Option<TableSchema>> {
        Ok(self.get(commit_id).await?.and_then(|s| s.tables.get(table_key).cloned()))
    }
}

#[derive(Default)]
pub struct FakeRefStore {
    refs: Mutex<BTreeMap<(DatasetId, String), Option<CommitId>>>,
}

#[async_trait]
impl RefStore for FakeRefStore {
    async fn create_ref(
        &self,
        dataset_id: DatasetId,
        name: &str,
        commit_id: Option<CommitId>,
    ) -> Result<()> {
        let mut guard = self.refs.lock().unwrap();
        let key = (dataset_id, name.to_string());
        if guard.contains_key(&key) {
            return Err(RowledgerError::Conflict(format!(
                "ref `{name}` already exists for dataset {dataset_id}"
            )));
        }
        guard.insert(key, commit_id);
        Ok(())
    }

    async fn get_ref(&self, dataset_id: DatasetId, name: &str) -> Result<Option<Ref>> {
        let guard = self.refs.lock().unwrap();
        Ok(guard
            .get(&(dataset_id, name.to_string()))
            .map(|commit_id| Ref {
                dataset_id,
                name: name.to_string(),
                commit_id: *commit_id,
            }))
    }

    async fn compare_and_set(
        &self,
        dataset_id: DatasetId,
        name: &str,
        expected: Option<CommitId>,
        new_commit: CommitId,
    ) -> Result<bool> {
        let mut guard = self.refs.lock().unwrap();
        let key = (dataset_id, name.to_string());
        match guard.get(&key) {
            Some(current) if *current == expected => {
                guard.insert(key, Some(new_commit));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_refs(&self, dataset_id: DatasetId) -> Result<Vec<Ref>> {
        let guard = self.refs.lock().unwrap();
        Ok(guard
            .iter()
            .filter(|((d, _), _)| *d == dataset_id)
            .map(|((d, name), commit_id)| Ref {
                dataset_id: *d,
                name: name.clone(),
                commit_id: *commit_id,
            })
            .collect())
    }

    async fn delete_ref(&self, dataset_id: DatasetId, name: &str) -> Result<bool> {
        if name == crate::model::DEFAULT_BRANCH {
            return Err(RowledgerError::InvalidInput(
                "the default branch cannot be deleted".to_string(),
            ));
        }
        Ok(self
            .refs
            .lock()
            .unwrap()
            .remove(&(dataset_id, name.to_string()))
            .is_some())
    }
}

#[derive(Default)]
pub struct FakeJobQueue {
    jobs: Mutex<BTreeMap<Uuid, Job>>,
    order: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl JobQueue for FakeJobQueue {
    async fn enqueue(
        &self,
        run_type: RunType,
        dataset_id: DatasetId,
        user_id: i64,
        source_commit_id: Option<CommitId>,
        run_parameters: serde_json::Value,
    ) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let job = Job {
            job_id,
            run_type,
            status: JobStatus::Pending,
            dataset_id,
            user_id,
            source_commit_id,
            run_parameters,
            output_summary: None,
            error_message: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        };
        self.jobs.lock().unwrap().insert(job_id, job);
        self.order.lock().unwrap().push(job_id);
        Ok(job_id)
    }

    async fn acquire_next_pending(&self, run_type: Option<RunType>) -> Result<Option<Job>> {
        let order = self.order.lock().unwrap();
        let mut jobs = self.jobs.lock().unwrap();
        for job_id in order.iter() {
            if let Some(job) = jobs.get_mut(job_id) {
                if job.status == JobStatus::Pending
                    && run_type.map(|rt| rt == job.run_type).unwrap_or(true)
                {
                    job.status = JobStatus::Running;
                    return Ok(Some(job.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        output_summary: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut guard = self.jobs.lock().unwrap();
        let job = guard
            .get_mut(&job_id)
            .ok_or_else(|| RowledgerError::not_found("job", job_id.to_string()))?;
        job.status = status;
        job.output_summary = output_summary;
        job.error_message = error_message;
        if status.is_terminal() {
            job.completed_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn list_for_dataset(&self, dataset_id: DatasetId, limit: u64) -> Result<Vec<Job>> {
        let guard = self.jobs.lock().unwrap();
        let mut jobs: Vec<Job> = guard
            .values()
            .filter(|j| j.dataset_id == dataset_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit as usize);
        Ok(jobs)
    }

    async fn list_running(&self) -> Result<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeDatasetStore {
    datasets: Mutex<BTreeMap<DatasetId, Dataset>>,
    next_id: Mutex<i64>,
}

#[async_trait]
impl DatasetStore for FakeDatasetStore {
    async fn create(
        &self,
        name: String,
        description: String,
        created_by: i64,
        tags: Vec<String>,
    ) -> Result<Dataset> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let dataset = Dataset {
            id: DatasetId(*next_id),
            name,
            description,
            created_by,
            tags,
            created_at: chrono::Utc::now(),
        };
        self.datasets.lock().unwrap().insert(dataset.id, dataset.clone());
        Ok(dataset)
    }

    async fn get(&self, dataset_id: DatasetId) -> Result<Option<Dataset>> {
        Ok(self.datasets.lock().unwrap().get(&dataset_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Dataset>> {
        Ok(self.datasets.lock().unwrap().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ref_cas_rejects_stale_expected_value() {
        let refs = FakeRefStore::default();
        let dataset_id = DatasetId(1);
        refs.create_ref(dataset_id, "main", None).await.unwrap();
        let c1 = CommitId::of(b"commit one");
        let c2 = CommitId::of(b"commit two");

        assert!(refs
            .compare_and_set(dataset_id, "main", None, c1)
            .await
            .unwrap());
        // Stale caller still thinks the ref is unset; loses the race.
        assert!(!refs
            .compare_and_set(dataset_id, "main", None, c2)
            .await
            .unwrap());
        assert_eq!(
            refs.get_ref(dataset_id, "main").await.unwrap().unwrap().commit_id,
            Some(c1)
        );
    }

    #[tokio::test]
    async fn default_branch_cannot_be_deleted() {
        let refs = FakeRefStore::default();
        let dataset_id = DatasetId(1);
        refs.create_ref(dataset_id, crate::model::DEFAULT_BRANCH, None)
            .await
            .unwrap();
        assert!(refs
            .delete_ref(dataset_id, crate::model::DEFAULT_BRANCH)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn job_queue_hands_each_pending_job_to_exactly_one_caller() {
        let queue = FakeJobQueue::default();
        let dataset_id = DatasetId(1);
        queue
            .enqueue(RunType::Import, dataset_id, 1, None, serde_json::json!({}))
            .await
            .unwrap();

        let first = queue.acquire_next_pending(None).await.unwrap();
        assert!(first.is_some());
        let second = queue.acquire_next_pending(None).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn row_store_upsert_is_idempotent() {
        let store = FakeRowStore::default();
        let row = Row::new(RowHash::of(b"row bytes"), serde_json::json!({"a": 1}));
        store.upsert_rows(&[row.clone(), row.clone()]).await.unwrap();
        assert!(store.exists(&row.row_hash).await.unwrap());
        assert_eq!(store.fetch(&[row.row_hash]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn manifest_page_orders_by_table_then_integer_index() {
        let commits = FakeCommitStore::default();
        let table = TableKey::primary();
        let commit = Commit {
            commit_id: CommitId::of(b"commit"),
            dataset_id: DatasetId(1),
            parent_commit_id: None,
            message: "import".to_string(),
            author_id: 1,
            committed_at: chrono::Utc::now(),
        };
        let manifest = vec![
            ManifestEntry {
                logical_row_id: LogicalRowId::new(table.clone(), 10),
                row_hash: RowHash::of(b"row 10"),
            },
            ManifestEntry {
                logical_row_id: LogicalRowId::new(table.clone(), 2),
                row_hash: RowHash::of(b"row 2"),
            },
        ];
        commits
            .write_commit(&commit, &manifest, &CommitSchema::default())
            .await
            .unwrap();

        let page = commits
            .page(&commit.commit_id, &table, 0, 10)
            .await
            .unwrap();
        let indices: Vec<u64> = page.iter().map(|(id, _)| id.index).collect();
        assert_eq!(indices, vec![2, 10]);
    }
}
