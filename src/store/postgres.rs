//! Postgres-backed implementation of every store trait in `super`, via
//! `sea_orm`'s raw-SQL path (`Statement::from_sql_and_values`) rather than
//! its entity macros: the versioning engine's queries — recursive CTEs,
//! `FOR UPDATE SKIP LOCKED`, conditional `UPDATE ... WHERE` CAS — don't fit
//! the entity/ActiveModel model cleanly, and the original system (see
//! `examples/original_source/src/core/infrastructure/postgres/*.py`) is
//! itself hand-written parameterized SQL. `sea_orm::ConnectionTrait` is
//! implemented by both the pool (`DatabaseConnection`) and a single
//! transaction (`DatabaseTransaction`), so every query function below is
//! generic over the connection and works unchanged inside a
//! `TransactionScope`.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, Value};
use uuid::Uuid;

use crate::errors::{Result, RowledgerError};
use crate::hash::{CommitId, RowHash};
use crate::model::dataset::DatasetId;
use crate::model::{
    Commit, CommitHistoryEntry, CommitSchema, Dataset, Job, JobStatus, LogicalRowId,
    ManifestEntry, Ref, Row, RunType, TableKey, TableSchema,
};
use crate::txn::TransactionScope;

use super::{
    AtomicCommitWriter, CommitStore, DatasetStore, JobQueue, ManifestStore, RefStore, RowStore,
    SchemaStore,
};

fn stmt(sql: &str, params: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(DbBackend::Postgres, sql, params)
}

/// A single connection-pool-backed handle implementing every store trait,
/// mirroring `PostgresUnitOfWork`'s lazily-shared connection in the
/// original — except here each method borrows the pool (cheap to clone,
/// `sea_orm::DatabaseConnection` is an `Arc` internally) rather than a
/// single checked-out connection, since only the atomic commit group needs
/// connection affinity and that goes through `TransactionScope` instead.
#[derive(Clone)]
pub struct PgStore {
    pool: DatabaseConnection,
}

impl PgStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &DatabaseConnection {
        &self.pool
    }
}

#[async_trait]
impl RowStore for PgStore {
    async fn upsert_rows(&self, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        // One multi-row INSERT per batch (SPEC_FULL "bulk load style"):
        // idempotent on `row_hash`, atomic as a single statement.
        let mut sql = String::from("INSERT INTO rows (row_hash, data) VALUES ");
        let mut params = Vec::with_capacity(rows.len() * 2);
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            sql.push_str(&format!("(${}, ${}::jsonb)", i * 2 + 1, i * 2 + 2));
            params.push(Value::from(row.row_hash.to_hex()));
            params.push(Value::from(row.data.to_string()));
        }
        sql.push_str(" ON CONFLICT (row_hash) DO NOTHING");
        self.pool.execute(stmt(&sql, params)).await?;
        Ok(())
    }

    async fn exists(&self, hash: &RowHash) -> Result<bool> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT 1 FROM rows WHERE row_hash = $1",
                vec![Value::from(hash.to_hex())],
            ))
            .await?;
        Ok(row.is_some())
    }

    async fn fetch(&self, hashes: &[RowHash]) -> Result<Vec<Row>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=hashes.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "SELECT row_hash, data FROM rows WHERE row_hash IN ({})",
            placeholders.join(",")
        );
        let params = hashes.iter().map(|h| Value::from(h.to_hex())).collect();
        let rows = self.pool.query_all(stmt(&sql, params)).await?;
        rows.into_iter()
            .map(|r| {
                let hash: String = r.try_get("", "row_hash").map_err(RowledgerError::from)?;
                let data: String = r.try_get("", "data").map_err(RowledgerError::from)?;
                let data = serde_json::from_str(&data)
                    .map_err(|e| RowledgerError::Storage(format!("corrupt row data: {e}")))?;
                let row_hash = hash
                    .parse()
                    .map_err(|e| RowledgerError::Storage(format!("corrupt row_hash: {e}")))?;
                Ok(Row::new(row_hash, data))
            })
            .collect()
    }
}

async fn insert_commit(conn: &impl ConnectionTrait, commit: &Commit) -> Result<()> {
    conn.execute(stmt(
        "INSERT INTO commits (commit_id, dataset_id, parent_commit_id, message, author_id, committed_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
        vec![
            Value::from(commit.commit_id.to_hex()),
            Value::from(commit.dataset_id.0),
            commit.parent_commit_id.map(|c| c.to_hex()).into(),
            Value::from(commit.message.clone()),
            Value::from(commit.author_id),
            Value::from(commit.committed_at),
        ],
    ))
    .await?;
    Ok(())
}

async fn insert_manifest(
    conn: &impl ConnectionTrait,
    commit_id: &CommitId,
    manifest: &[ManifestEntry],
) -> Result<()> {
    if manifest.is_empty() {
        return Ok(());
    }
    let mut sql =
        String::from("INSERT INTO commit_rows (commit_id, logical_row_id, row_hash) VALUES ");
    let mut params = Vec::with_capacity(manifest.len() * 3);
    for (i, entry) in manifest.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str(&format!(
            "(${}, ${}, ${})",
            i * 3 + 1,
            i * 3 + 2,
            i * 3 + 3
        ));
        params.push(Value::from(commit_id.to_hex()));
        params.push(Value::from(entry.logical_row_id.to_string()));
        params.push(Value::from(entry.row_hash.to_hex()));
    }
    conn.execute(stmt(&sql, params)).await?;
    Ok(())
}

async fn insert_schema(
    conn: &impl ConnectionTrait,
    commit_id: &CommitId,
    schema: &CommitSchema,
) -> Result<()> {
    let json = serde_json::to_string(schema)
        .map_err(|e| RowledgerError::Storage(format!("schema does not serialize: {e}")))?;
    conn.execute(stmt(
        "INSERT INTO commit_schemas (commit_id, schema_definition) VALUES ($1, $2::jsonb)",
        vec![Value::from(commit_id.to_hex()), Value::from(json)],
    ))
    .await?;
    Ok(())
}

#[async_trait]
impl AtomicCommitWriter for PgStore {
    async fn write_commit(
        &self,
        commit: &Commit,
        manifest: &[ManifestEntry],
        schema: &CommitSchema,
    ) -> Result<()> {
        let scope = TransactionScope::begin(&self.pool).await?;
        insert_commit(scope.connection(), commit).await?;
        insert_manifest(scope.connection(), &commit.commit_id, manifest).await?;
        insert_schema(scope.connection(), &commit.commit_id, schema).await?;
        scope.commit().await
    }
}

fn row_to_commit(r: &sea_orm::QueryResult) -> Result<Commit> {
    let commit_id: String = r.try_get("", "commit_id")?;
    let dataset_id: i64 = r.try_get("", "dataset_id")?;
    let parent_commit_id: Option<String> = r.try_get("", "parent_commit_id")?;
    let message: String = r.try_get("", "message")?;
    let author_id: i64 = r.try_get("", "author_id")?;
    let committed_at = r.try_get("", "committed_at")?;
    Ok(Commit {
        commit_id: commit_id
            .parse()
            .map_err(|e| RowledgerError::Storage(format!("corrupt commit_id: {e}")))?,
        dataset_id: DatasetId(dataset_id),
        parent_commit_id: parent_commit_id
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| RowledgerError::Storage(format!("corrupt parent_commit_id: {e}")))?,
        message,
        author_id,
        committed_at,
    })
}

#[async_trait]
impl CommitStore for PgStore {
    async fn get(&self, commit_id: &CommitId) -> Result<Option<Commit>> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT commit_id, dataset_id, parent_commit_id, message, author_id, committed_at \
                 FROM commits WHERE commit_id = $1",
                vec![Value::from(commit_id.to_hex())],
            ))
            .await?;
        row.as_ref().map(row_to_commit).transpose()
    }

    async fn exists(&self, commit_id: &CommitId) -> Result<bool> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT 1 FROM commits WHERE commit_id = $1",
                vec![Value::from(commit_id.to_hex())],
            ))
            .await?;
        Ok(row.is_some())
    }

    async fn history(
        &self,
        dataset_id: DatasetId,
        ref_name: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<CommitHistoryEntry>> {
        let sql = r#"
            WITH RECURSIVE commit_history AS (
                SELECT c.*
                FROM commits c
                JOIN refs r ON c.commit_id = r.commit_id
                WHERE r.dataset_id = $1 AND r.name = $2
                UNION ALL
                SELECT c.*
                FROM commits c
                JOIN commit_history ch ON c.commit_id = ch.parent_commit_id
            )
            SELECT commit_id, dataset_id, parent_commit_id, message, author_id, committed_at,
                   (SELECT COUNT(*) FROM commit_rows WHERE commit_id = commit_history.commit_id) AS row_count
            FROM commit_history
            ORDER BY committed_at DESC
            OFFSET $3 LIMIT $4
        "#;
        let rows = self
            .pool
            .query_all(stmt(
                sql,
                vec![
                    Value::from(dataset_id.0),
                    Value::from(ref_name.to_string()),
                    Value::from(offset as i64),
                    Value::from(limit as i64),
                ],
            ))
            .await?;
        rows.iter()
            .map(|r| {
                let row_count: i64 = r.try_get("", "row_count")?;
                Ok(CommitHistoryEntry {
                    commit: row_to_commit(r)?,
                    row_count: row_count as u64,
                })
            })
            .collect()
    }

    async fn count_ancestors(&self, dataset_id: DatasetId, ref_name: &str) -> Result<u64> {
        let sql = r#"
            WITH RECURSIVE commit_history AS (
                SELECT c.commit_id, c.parent_commit_id
                FROM commits c
                JOIN refs r ON c.commit_id = r.commit_id
                WHERE r.dataset_id = $1 AND r.name = $2
                UNION ALL
                SELECT c.commit_id, c.parent_commit_id
                FROM commits c
                JOIN commit_history ch ON c.commit_id = ch.parent_commit_id
            )
            SELECT COUNT(*) AS n FROM commit_history
        "#;
        let row = self
            .pool
            .query_one(stmt(
                sql,
                vec![Value::from(dataset_id.0), Value::from(ref_name.to_string())],
            ))
            .await?;
        let n: i64 = row
            .map(|r| r.try_get("", "n"))
            .transpose()?
            .unwrap_or(0);
        Ok(n as u64)
    }
}

#[async_trait]
impl ManifestStore for PgStore {
    async fn list_table_keys(&self, commit_id: &CommitId) -> Result<Vec<TableKey>> {
        // Prefer the schema (§4.5: "derived from the commit schema when
        // present"); fall back to distinct manifest prefixes otherwise.
        let schema_row = self
            .pool
            .query_one(stmt(
                "SELECT schema_definition FROM commit_schemas WHERE commit_id = $1",
                vec![Value::from(commit_id.to_hex())],
            ))
            .await?;
        if let Some(row) = schema_row {
            let json: String = row.try_get("", "schema_definition")?;
            let schema: CommitSchema = serde_json::from_str(&json)
                .map_err(|e| RowledgerError::Storage(format!("corrupt schema: {e}")))?;
            if !schema.tables.is_empty() {
                return Ok(schema.table_keys());
            }
        }

        let rows = self
            .pool
            .query_all(stmt(
                "SELECT DISTINCT split_part(logical_row_id, ':', 1) AS table_key \
                 FROM commit_rows WHERE commit_id = $1 ORDER BY table_key",
                vec![Value::from(commit_id.to_hex())],
            ))
            .await?;
        rows.iter()
            .map(|r| {
                let key: String = r.try_get("", "table_key")?;
                TableKey::new(key)
            })
            .collect()
    }

    async fn count_rows(&self, commit_id: &CommitId, table_key: &TableKey) -> Result<u64> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT COUNT(*) AS n FROM commit_rows \
                 WHERE commit_id = $1 AND split_part(logical_row_id, ':', 1) = $2",
                vec![
                    Value::from(commit_id.to_hex()),
                    Value::from(table_key.to_string()),
                ],
            ))
            .await?;
        let n: i64 = row.map(|r| r.try_get("", "n")).transpose()?.unwrap_or(0);
        Ok(n as u64)
    }

    async fn page(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<(LogicalRowId, Row)>> {
        let sql = r#"
            SELECT cr.logical_row_id, r.row_hash, r.data
            FROM commit_rows cr
            JOIN rows r ON cr.row_hash = r.row_hash
            WHERE cr.commit_id = $1 AND split_part(cr.logical_row_id, ':', 1) = $2
            ORDER BY split_part(cr.logical_row_id, ':', 1),
                     (split_part(cr.logical_row_id, ':', 2))::bigint
            OFFSET $3 LIMIT $4
        "#;
        let rows = self
            .pool
            .query_all(stmt(
                sql,
                vec![
                    Value::from(commit_id.to_hex()),
                    Value::from(table_key.to_string()),
                    Value::from(offset as i64),
                    Value::from(limit as i64),
                ],
            ))
            .await?;
        rows.iter()
            .map(|r| {
                let logical_row_id: String = r.try_get("", "logical_row_id")?;
                let row_hash: String = r.try_get("", "row_hash")?;
                let data: String = r.try_get("", "data")?;
                let data = serde_json::from_str(&data)
                    .map_err(|e| RowledgerError::Storage(format!("corrupt row data: {e}")))?;
                Ok((
                    logical_row_id
                        .parse()
                        .map_err(|e: RowledgerError| RowledgerError::Storage(e.to_string()))?,
                    Row::new(
                        row_hash
                            .parse()
                            .map_err(|e| RowledgerError::Storage(format!("corrupt row_hash: {e}")))?,
                        data,
                    ),
                ))
            })
            .collect()
    }

    async fn batch_row_counts(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<(CommitId, TableKey, u64)>> {
        if commit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=commit_ids.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "SELECT commit_id, split_part(logical_row_id, ':', 1) AS table_key, COUNT(*) AS n \
             FROM commit_rows WHERE commit_id IN ({}) GROUP BY commit_id, table_key",
            placeholders.join(",")
        );
        let params = commit_ids.iter().map(|c| Value::from(c.to_hex())).collect();
        let rows = self.pool.query_all(stmt(&sql, params)).await?;
        rows.iter()
            .map(|r| {
                let commit_id: String = r.try_get("", "commit_id")?;
                let table_key: String = r.try_get("", "table_key")?;
                let n: i64 = r.try_get("", "n")?;
                Ok((
                    commit_id
                        .parse()
                        .map_err(|e| RowledgerError::Storage(format!("corrupt commit_id: {e}")))?,
                    TableKey::new(table_key)?,
                    n as u64,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl SchemaStore for PgStore {
    async fn get(&self, commit_id: &CommitId) -> Result<Option<CommitSchema>> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT schema_definition FROM commit_schemas WHERE commit_id = $1",
                vec![Value::from(commit_id.to_hex())],
            ))
            .await?;
        row.map(|r| {
            let json: String = r.try_get("", "schema_definition")?;
            serde_json::from_str(&json)
                .map_err(|e| RowledgerError::Storage(format!("corrupt schema: {e}")))
        })
        .transpose()
    }

    async fn table_schema(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
    ) -> Result<Option<TableSchema>> {
        Ok(self
            .get(commit_id)
            .await?
            .and_then(|s| s.tables.get(table_key).cloned()))
    }
}

#[async_trait]
impl RefStore for PgStore {
    async fn create_ref(
        &self,
        dataset_id: DatasetId,
        name: &str,
        commit_id: Option<CommitId>,
    ) -> Result<()> {
        let existing = self.get_ref(dataset_id, name).await?;
        if existing.is_some() {
            return Err(RowledgerError::Conflict(format!(
                "ref `{name}` already exists for dataset {dataset_id}"
            )));
        }
        self.pool
            .execute(stmt(
                "INSERT INTO refs (dataset_id, name, commit_id) VALUES ($1, $2, $3)",
                vec![
                    Value::from(dataset_id.0),
                    Value::from(name.to_string()),
                    commit_id.map(|c| c.to_hex()).into(),
                ],
            ))
            .await?;
        Ok(())
    }

    async fn get_ref(&self, dataset_id: DatasetId, name: &str) -> Result<Option<Ref>> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT name, commit_id FROM refs WHERE dataset_id = $1 AND name = $2",
                vec![Value::from(dataset_id.0), Value::from(name.to_string())],
            ))
            .await?;
        row.map(|r| {
            let name: String = r.try_get("", "name")?;
            let commit_id: Option<String> = r.try_get("", "commit_id")?;
            Ok(Ref {
                dataset_id,
                name,
                commit_id: commit_id
                    .map(|s| s.parse())
                    .transpose()
                    .map_err(|e| RowledgerError::Storage(format!("corrupt commit_id: {e}")))?,
            })
        })
        .transpose()
    }

    async fn compare_and_set(
        &self,
        dataset_id: DatasetId,
        name: &str,
        expected: Option<CommitId>,
        new_commit: CommitId,
    ) -> Result<bool> {
        let sql = "UPDATE refs SET commit_id = $3 \
                   WHERE dataset_id = $1 AND name = $2 \
                   AND (commit_id = $4 OR (commit_id IS NULL AND $4 IS NULL))";
        let result = self
            .pool
            .execute(stmt(
                sql,
                vec![
                    Value::from(dataset_id.0),
                    Value::from(name.to_string()),
                    Value::from(new_commit.to_hex()),
                    expected.map(|c| c.to_hex()).into(),
                ],
            ))
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_refs(&self, dataset_id: DatasetId) -> Result<Vec<Ref>> {
        let rows = self
            .pool
            .query_all(stmt(
                "SELECT name, commit_id FROM refs WHERE dataset_id = $1 ORDER BY name",
                vec![Value::from(dataset_id.0)],
            ))
            .await?;
        rows.iter()
            .map(|r| {
                let name: String = r.try_get("", "name")?;
                let commit_id: Option<String> = r.try_get("", "commit_id")?;
                Ok(Ref {
                    dataset_id,
                    name,
                    commit_id: commit_id
                        .map(|s| s.parse())
                        .transpose()
                        .map_err(|e| RowledgerError::Storage(format!("corrupt commit_id: {e}")))?,
                })
            })
            .collect()
    }

    async fn delete_ref(&self, dataset_id: DatasetId, name: &str) -> Result<bool> {
        if name == crate::model::DEFAULT_BRANCH {
            return Err(RowledgerError::InvalidInput(
                "the default branch cannot be deleted".to_string(),
            ));
        }
        let result = self
            .pool
            .execute(stmt(
                "DELETE FROM refs WHERE dataset_id = $1 AND name = $2",
                vec![Value::from(dataset_id.0), Value::from(name.to_string())],
            ))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_job(r: &sea_orm::QueryResult) -> Result<Job> {
    let job_id: Uuid = r.try_get("", "job_id")?;
    let run_type: String = r.try_get("", "run_type")?;
    let status: String = r.try_get("", "status")?;
    let dataset_id: i64 = r.try_get("", "dataset_id")?;
    let user_id: i64 = r.try_get("", "user_id")?;
    let source_commit_id: Option<String> = r.try_get("", "source_commit_id")?;
    let run_parameters: String = r.try_get("", "run_parameters")?;
    let output_summary: Option<String> = r.try_get("", "output_summary")?;
    let error_message: Option<String> = r.try_get("", "error_message")?;
    let created_at = r.try_get("", "created_at")?;
    let completed_at = r.try_get("", "completed_at")?;

    Ok(Job {
        job_id,
        run_type: run_type
            .parse()
            .map_err(|e: String| RowledgerError::Storage(e))?,
        status: status
            .parse()
            .map_err(|e: String| RowledgerError::Storage(e))?,
        dataset_id: DatasetId(dataset_id),
        user_id,
        source_commit_id: source_commit_id
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| RowledgerError::Storage(format!("corrupt source_commit_id: {e}")))?,
        run_parameters: serde_json::from_str(&run_parameters)
            .map_err(|e| RowledgerError::Storage(format!("corrupt run_parameters: {e}")))?,
        output_summary: output_summary
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| RowledgerError::Storage(format!("corrupt output_summary: {e}")))?,
        error_message,
        created_at,
        completed_at,
    })
}

#[async_trait]
impl JobQueue for PgStore {
    async fn enqueue(
        &self,
        run_type: RunType,
        dataset_id: DatasetId,
        user_id: i64,
        source_commit_id: Option<CommitId>,
        run_parameters: serde_json::Value,
    ) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        self.pool
            .execute(stmt(
                "INSERT INTO jobs (job_id, run_type, status, dataset_id, user_id, \
                 source_commit_id, run_parameters, created_at) \
                 VALUES ($1, $2, 'pending', $3, $4, $5, $6::jsonb, now())",
                vec![
                    Value::from(job_id),
                    Value::from(run_type.as_str()),
                    Value::from(dataset_id.0),
                    Value::from(user_id),
                    source_commit_id.map(|c| c.to_hex()).into(),
                    Value::from(run_parameters.to_string()),
                ],
            ))
            .await?;
        Ok(job_id)
    }

    async fn acquire_next_pending(&self, run_type: Option<RunType>) -> Result<Option<Job>> {
        let sql = match run_type {
            Some(_) => {
                "UPDATE jobs SET status = 'running' \
                 WHERE job_id = ( \
                     SELECT job_id FROM jobs \
                     WHERE status = 'pending' AND run_type = $1 \
                     ORDER BY created_at \
                     FOR UPDATE SKIP LOCKED LIMIT 1 \
                 ) \
                 RETURNING job_id, run_type, status, dataset_id, user_id, source_commit_id, \
                           run_parameters, output_summary, error_message, created_at, completed_at"
            }
            None => {
                "UPDATE jobs SET status = 'running' \
                 WHERE job_id = ( \
                     SELECT job_id FROM jobs \
                     WHERE status = 'pending' \
                     ORDER BY created_at \
                     FOR UPDATE SKIP LOCKED LIMIT 1 \
                 ) \
                 RETURNING job_id, run_type, status, dataset_id, user_id, source_commit_id, \
                           run_parameters, output_summary, error_message, created_at, completed_at"
            }
        };
        let params = match run_type {
            Some(rt) => vec![Value::from(rt.as_str())],
            None => vec![],
        };
        let row = self.pool.query_one(stmt(sql, params)).await?;
        row.as_ref().map(row_to_job).transpose()
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        output_summary: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<()> {
        let sql = "UPDATE jobs SET status = $2, output_summary = $3::jsonb, error_message = $4, \
                   completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN now() ELSE NULL END \
                   WHERE job_id = $1";
        self.pool
            .execute(stmt(
                sql,
                vec![
                    Value::from(job_id),
                    Value::from(status.as_str()),
                    output_summary.map(|s| s.to_string()).into(),
                    error_message.into(),
                ],
            ))
            .await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT job_id, run_type, status, dataset_id, user_id, source_commit_id, \
                 run_parameters, output_summary, error_message, created_at, completed_at \
                 FROM jobs WHERE job_id = $1",
                vec![Value::from(job_id)],
            ))
            .await?;
        row.as_ref().map(row_to_job).transpose()
    }

    async fn list_for_dataset(&self, dataset_id: DatasetId, limit: u64) -> Result<Vec<Job>> {
        let rows = self
            .pool
            .query_all(stmt(
                "SELECT job_id, run_type, status, dataset_id, user_id, source_commit_id, \
                 run_parameters, output_summary, error_message, created_at, completed_at \
                 FROM jobs WHERE dataset_id = $1 ORDER BY created_at DESC LIMIT $2",
                vec![Value::from(dataset_id.0), Value::from(limit as i64)],
            ))
            .await?;
        rows.iter().map(row_to_job).collect()
    }

    async fn list_running(&self) -> Result<Vec<Job>> {
        let rows = self
            .pool
            .query_all(stmt(
                "SELECT job_id, run_type, status, dataset_id, user_id, source_commit_id, \
                 run_parameters, output_summary, error_message, created_at, completed_at \
                 FROM jobs WHERE status = 'running'",
                vec![],
            ))
            .await?;
        rows.iter().map(row_to_job).collect()
    }
}

fn row_to_dataset(r: &sea_orm::QueryResult) -> Result<Dataset> {
    let id: i64 = r.try_get("", "id")?;
    let tags: String = r.try_get("", "tags")?;
    Ok(Dataset {
        id: DatasetId(id),
        name: r.try_get("", "name")?,
        description: r.try_get("", "description")?,
        created_by: r.try_get("", "created_by")?,
        tags: serde_json::from_str(&tags)
            .map_err(|e| RowledgerError::Storage(format!("corrupt tags: {e}")))?,
        created_at: r.try_get("", "created_at")?,
    })
}

#[async_trait]
impl DatasetStore for PgStore {
    async fn create(
        &self,
        name: String,
        description: String,
        created_by: i64,
        tags: Vec<String>,
    ) -> Result<Dataset> {
        let tags_json = serde_json::to_string(&tags)
            .map_err(|e| RowledgerError::Storage(format!("tags do not serialize: {e}")))?;
        let row = self
            .pool
            .query_one(stmt(
                "INSERT INTO datasets (name, description, created_by, tags, created_at) \
                 VALUES ($1, $2, $3, $4::jsonb, now()) \
                 RETURNING id, name, description, created_by, tags, created_at",
                vec![
                    Value::from(name),
                    Value::from(description),
                    Value::from(created_by),
                    Value::from(tags_json),
                ],
            ))
            .await?
            .ok_or_else(|| RowledgerError::Storage("insert returned no row".to_string()))?;
        row_to_dataset(&row)
    }

    async fn get(&self, dataset_id: DatasetId) -> Result<Option<Dataset>> {
        let row = self
            .pool
            .query_one(stmt(
                "SELECT id, name, description, created_by, tags, created_at \
                 FROM datasets WHERE id = $1",
                vec![Value::from(dataset_id.0)],
            ))
            .await?;
        row.as_ref().map(row_to_dataset).transpose()
    }

    async fn list(&self) -> Result<Vec<Dataset>> {
        let rows = self
            .pool
            .query_all(stmt(
                "SELECT id, name, description, created_by, tags, created_at \
                 FROM datasets ORDER BY created_at DESC",
                vec![],
            ))
            .await?;
        rows.iter().map(row_to_dataset).collect()
    }
}
