//! Import Worker (§4.8): the background task that turns a pending `import`
//! job into a commit. One call to [`ImportWorker::run_once`] processes at
//! most one job; `run_forever` polls the queue on `job_poll_interval`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::commit_builder::CommitBuilder;
use crate::errors::{Result, RowledgerError};
use crate::hash::RowHash;
use crate::model::{
    ImportOutputSummary, ImportRunParameters, Job, JobStatus, LogicalRowId, ManifestEntry, Row,
    RunType,
};
use crate::model::CommitSchema;
use crate::parsers::parser_for_filename;
use crate::store::{JobQueue, RefStore, RowStore};

pub struct ImportWorker {
    job_queue: Arc<dyn JobQueue>,
    ref_store: Arc<dyn RefStore>,
    row_store: Arc<dyn RowStore>,
    commit_builder: Arc<CommitBuilder>,
    batch_size: usize,
    parallel_threshold: usize,
}

impl ImportWorker {
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        ref_store: Arc<dyn RefStore>,
        row_store: Arc<dyn RowStore>,
        commit_builder: Arc<CommitBuilder>,
        batch_size: usize,
        parallel_threshold: usize,
    ) -> Self {
        ImportWorker {
            job_queue,
            ref_store,
            row_store,
            commit_builder,
            batch_size,
            parallel_threshold,
        }
    }

    /// Fail-fast crash recovery (SPEC_FULL "crash recovery for running
    /// jobs", §4.8 "Crash recovery"): every job still `running` at startup
    /// did not survive its worker, so it is marked `failed` rather than
    /// silently resumed — a caller can always resubmit the same import and
    /// get the same `commit_id` back, since commit derivation is
    /// content-addressed (§8 "at-least-once... safe").
    pub async fn recover_crashed_jobs(&self) -> Result<()> {
        for job in self.job_queue.list_running().await? {
            warn!(job_id = %job.job_id, "marking job failed: found running at worker startup");
            self.job_queue
                .update_status(
                    job.job_id,
                    JobStatus::Failed,
                    None,
                    Some("worker restarted while this job was running".to_string()),
                )
                .await?;
        }
        Ok(())
    }

    /// Polls for one pending `import` job and processes it if found.
    /// Returns `true` if a job was acquired (regardless of outcome), so
    /// `run_forever` knows whether to poll again immediately or sleep.
    pub async fn run_once(&self) -> Result<bool> {
        let Some(job) = self.job_queue.acquire_next_pending(Some(RunType::Import)).await? else {
            return Ok(false);
        };
        self.process(job).await;
        Ok(true)
    }

    pub async fn run_forever(&self, poll_interval: std::time::Duration) {
        loop {
            match self.run_once().await {
                Ok(true) => continue,
                Ok(false) => tokio::time::sleep(poll_interval).await,
                Err(e) => {
                    warn!(error = %e, "job queue poll failed");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    async fn process(&self, job: Job) {
        let result = self.process_inner(&job).await;

        match result {
            Ok(summary) => {
                let output = serde_json::to_value(&summary).ok();
                if let Err(e) = self
                    .job_queue
                    .update_status(job.job_id, JobStatus::Completed, output, None)
                    .await
                {
                    warn!(job_id = %job.job_id, error = %e, "failed to mark job completed");
                }
            }
            Err(e) => {
                warn!(job_id = %job.job_id, error = %e, "import job failed");
                if let Err(update_err) = self
                    .job_queue
                    .update_status(job.job_id, JobStatus::Failed, None, Some(e.to_string()))
                    .await
                {
                    warn!(job_id = %job.job_id, error = %update_err, "failed to mark job failed");
                }
            }
        }
    }

    async fn process_inner(&self, job: &Job) -> Result<ImportOutputSummary> {
        let params: ImportRunParameters = serde_json::from_value(job.run_parameters.clone())
            .map_err(|e| RowledgerError::InvalidInput(format!("malformed run_parameters: {e}")))?;

        // Cleanup the temp file on every exit path (§4.8 step 8): this
        // guard's `Drop` fires whether `import` below returns `Ok` or `Err`.
        let _cleanup = TempFileGuard(params.temp_file_path.clone().into());

        let expected_parent = self
            .ref_store
            .get_ref(params.dataset_id, &params.target_ref)
            .await?
            .and_then(|r| r.commit_id);

        let parser = parser_for_filename(&params.filename)?;
        let parsed = parser.parse(std::path::Path::new(&params.temp_file_path)).await?;

        let mut manifest = Vec::new();
        let mut schema = CommitSchema::default();
        let mut rows_per_table: BTreeMap<String, u64> = BTreeMap::new();

        for mut table in parsed.tables {
            let column_order = table.schema.column_order();
            let mut index: u64 = 0;
            let mut batch: Vec<(RowHash, serde_json::Value)> = Vec::with_capacity(self.batch_size);

            while let Some(row) = table.rows.recv().await {
                let row = row?;
                let canonical_bytes = crate::canonical::canonicalize_row(&row, &column_order)?;
                let bytes_hash = RowHash::of(&canonical_bytes);
                let data = serde_json::from_slice(&canonical_bytes).map_err(|e| {
                    RowledgerError::Storage(format!("row did not round-trip: {e}"))
                })?;
                batch.push((bytes_hash, data));

                if batch.len() >= self.batch_size {
                    self.flush_batch(&mut batch).await?;
                }

                manifest.push(ManifestEntry {
                    logical_row_id: LogicalRowId::new(table.table_key.clone(), index),
                    row_hash: bytes_hash,
                });
                index += 1;
            }
            if !batch.is_empty() {
                self.flush_batch(&mut batch).await?;
            }

            rows_per_table.insert(table.table_key.to_string(), index);
            schema.tables.insert(table.table_key, table.schema);
        }

        let commit_id = self
            .commit_builder
            .finalize_commit(
                params.dataset_id,
                expected_parent,
                manifest,
                schema,
                params.commit_message,
                params.user_id,
            )
            .await?;

        let advanced = self
            .ref_store
            .compare_and_set(params.dataset_id, &params.target_ref, expected_parent, commit_id)
            .await?;

        if !advanced {
            return Err(RowledgerError::Conflict(format!(
                "ref `{}` advanced past expected parent while this import ran",
                params.target_ref
            )));
        }

        info!(
            job_id = %job.job_id,
            commit_id = %commit_id,
            rows = rows_per_table.values().sum::<u64>(),
            "import committed"
        );

        Ok(ImportOutputSummary {
            commit_id,
            rows_imported: rows_per_table.values().sum(),
            tables: rows_per_table,
        })
    }

    async fn flush_batch(&self, batch: &mut Vec<(RowHash, serde_json::Value)>) -> Result<()> {
        let rows: Vec<Row> = batch
            .drain(..)
            .map(|(row_hash, data)| Row::new(row_hash, data))
            .collect();
        self.row_store.upsert_rows(&rows).await
    }
}

struct TempFileGuard(std::path::PathBuf);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let path = self.0.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove temp upload file");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dataset::DatasetId;
    use crate::store::fakes::{FakeCommitStore, FakeJobQueue, FakeRefStore, FakeRowStore};
    use uuid::Uuid;

    fn build_worker() -> (
        ImportWorker,
        Arc<FakeJobQueue>,
        Arc<FakeRefStore>,
        Arc<FakeRowStore>,
    ) {
        let jobs = Arc::new(FakeJobQueue::default());
        let refs = Arc::new(FakeRefStore::default());
        let rows = Arc::new(FakeRowStore::default());
        let commits = Arc::new(FakeCommitStore::default());
        let builder = Arc::new(CommitBuilder::new(rows.clone(), commits.clone()));
        let worker = ImportWorker::new(
            jobs.clone(),
            refs.clone(),
            rows.clone(),
            builder,
            2,
            10_000,
        );
        (worker, jobs, refs, rows)
    }

    #[tokio::test]
    async fn recover_crashed_jobs_marks_running_jobs_failed() {
        let (worker, jobs, refs, _rows) = build_worker();
        let dataset_id = DatasetId(1);
        refs.create_ref(dataset_id, crate::model::DEFAULT_BRANCH, None)
            .await
            .unwrap();
        let job_id = jobs
            .enqueue(RunType::Import, dataset_id, 1, None, serde_json::json!({}))
            .await
            .unwrap();
        jobs.acquire_next_pending(None).await.unwrap();

        worker.recover_crashed_jobs().await.unwrap();

        let job = jobs.get(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    /// A real CSV file on disk, through `process_inner`, into a committed
    /// ref, exercising the parser, batching, canonicalization, and the CAS
    /// advance as one pipeline rather than in isolated unit tests.
    #[tokio::test]
    async fn processes_a_real_csv_upload_into_a_committed_ref() {
        let (worker, _jobs, refs, _rows) = build_worker();
        let dataset_id = DatasetId(7);
        refs.create_ref(dataset_id, crate::model::DEFAULT_BRANCH, None)
            .await
            .unwrap();

        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        use std::io::Write;
        writeln!(file, "name,age").unwrap();
        writeln!(file, "Ana,29").unwrap();
        writeln!(file, "Bo,41").unwrap();
        file.flush().unwrap();
        let temp_path = file.into_temp_path();
        let persisted = temp_path.keep().unwrap();

        let params = ImportRunParameters {
            dataset_id,
            target_ref: crate::model::DEFAULT_BRANCH.to_string(),
            temp_file_path: persisted.to_string_lossy().to_string(),
            filename: "sales.csv".to_string(),
            commit_message: "first import".to_string(),
            user_id: 1,
            file_size: 0,
        };
        let job = Job {
            job_id: Uuid::new_v4(),
            run_type: RunType::Import,
            status: JobStatus::Running,
            dataset_id,
            user_id: 1,
            source_commit_id: None,
            run_parameters: serde_json::to_value(&params).unwrap(),
            output_summary: None,
            error_message: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        };

        let summary = worker.process_inner(&job).await.unwrap();
        assert_eq!(summary.rows_imported, 2);

        let advanced_ref = refs
            .get_ref(dataset_id, crate::model::DEFAULT_BRANCH)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(advanced_ref.commit_id, Some(summary.commit_id));
        assert_eq!(summary.tables.get("primary"), Some(&2));
    }
}
