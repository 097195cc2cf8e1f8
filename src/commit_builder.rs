//! Commit Builder (§4.3): turns parsed tables into a content-addressed
//! commit. Row insertion, manifest assembly and commit-id derivation all
//! live here; the ref advance is the caller's separate, gated step.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::canonical::canonical_json_bytes;
use crate::errors::Result;
use crate::hash::{CommitId, RowHash};
use crate::model::dataset::DatasetId;
use crate::model::{Commit, CommitSchema, ManifestEntry, Row, TableKey, TableSchema};
use crate::store::{AtomicCommitWriter, RowStore};
use crate::value::RowValue;

/// One parsed logical table handed to [`CommitBuilder::create_commit`]:
/// its key, its column order (schema) and its rows in parser-produced
/// order — `logical_row_id` suffixes are assigned from that order (§5
/// "rows are laid out in the order their parser produced them").
pub struct LogicalTable {
    pub table_key: TableKey,
    pub schema: TableSchema,
    pub rows: Vec<RowValue>,
}

#[derive(Serialize)]
struct CommitEnvelope<'a> {
    dataset_id: DatasetId,
    parent_commit_id: Option<CommitId>,
    manifest: Vec<(String, String)>,
    message: &'a str,
    author_id: i64,
}

pub struct CommitBuilder {
    row_store: Arc<dyn RowStore>,
    commit_writer: Arc<dyn AtomicCommitWriter>,
}

impl CommitBuilder {
    pub fn new(row_store: Arc<dyn RowStore>, commit_writer: Arc<dyn AtomicCommitWriter>) -> Self {
        CommitBuilder {
            row_store,
            commit_writer,
        }
    }

    /// §4.3 steps 1-6. `parallel_threshold` gates whether canonicalization
    /// runs on a `rayon` pool (§5: "dispatched to a worker pool when
    /// batches exceed a threshold") or inline for small batches, where the
    /// thread-pool handoff would cost more than it saves.
    pub async fn create_commit(
        &self,
        dataset_id: DatasetId,
        parent_commit_id: Option<CommitId>,
        tables: Vec<LogicalTable>,
        message: String,
        author_id: i64,
        parallel_threshold: usize,
    ) -> Result<CommitId> {
        let mut manifest = Vec::new();
        let mut schema = CommitSchema::default();
        let mut dedup_rows: BTreeMap<RowHash, Row> = BTreeMap::new();

        for table in tables {
            let column_order = table.schema.column_order();
            let hashed = hash_rows(&table.rows, &column_order, parallel_threshold)?;

            for (index, (row_hash, data)) in hashed.into_iter().enumerate() {
                manifest.push(ManifestEntry {
                    logical_row_id: crate::model::LogicalRowId::new(
                        table.table_key.clone(),
                        index as u64,
                    ),
                    row_hash,
                });
                dedup_rows
                    .entry(row_hash)
                    .or_insert_with(|| Row::new(row_hash, data));
            }
            schema.tables.insert(table.table_key, table.schema);
        }

        let rows: Vec<Row> = dedup_rows.into_values().collect();
        self.row_store.upsert_rows(&rows).await?;

        self.finalize_commit(dataset_id, parent_commit_id, manifest, schema, message, author_id)
            .await
    }

    /// §4.3 steps 4-6 in isolation: derive `commit_id` from an
    /// already-assembled manifest and write the commit/manifest/schema
    /// atomically. [`ImportWorker`](crate::worker::ImportWorker) calls this
    /// directly after streaming its own batched row upserts (§4.8 step 5),
    /// rather than going through [`CommitBuilder::create_commit`]'s
    /// fully-materialized table list — both paths derive the same
    /// `commit_id` for the same manifest, which is what makes a replayed
    /// import idempotent regardless of which path produced it.
    pub async fn finalize_commit(
        &self,
        dataset_id: DatasetId,
        parent_commit_id: Option<CommitId>,
        manifest: Vec<ManifestEntry>,
        schema: CommitSchema,
        message: String,
        author_id: i64,
    ) -> Result<CommitId> {
        let commit_id =
            derive_commit_id(dataset_id, parent_commit_id, &manifest, &message, author_id)?;
        let commit = Commit {
            commit_id,
            dataset_id,
            parent_commit_id,
            message,
            author_id,
            committed_at: chrono::Utc::now(),
        };

        self.commit_writer
            .write_commit(&commit, &manifest, &schema)
            .await?;

        Ok(commit_id)
    }
}

fn hash_rows(
    rows: &[RowValue],
    column_order: &[String],
    parallel_threshold: usize,
) -> Result<Vec<(RowHash, serde_json::Value)>> {
    if rows.len() >= parallel_threshold {
        rows.par_iter()
            .map(|row| hash_one_row(row, column_order))
            .collect()
    } else {
        rows.iter().map(|row| hash_one_row(row, column_order)).collect()
    }
}

fn hash_one_row(row: &RowValue, column_order: &[String]) -> Result<(RowHash, serde_json::Value)> {
    let bytes = crate::canonical::canonicalize_row(row, column_order)?;
    let hash = RowHash::of(&bytes);
    let data = serde_json::from_slice(&bytes)
        .expect("canonicalize_row always produces valid JSON bytes");
    Ok((hash, data))
}

/// §6 normative pseudocode: SHA-256 over the sorted-key canonical JSON of
/// `(dataset_id, parent_commit_id, sorted(manifest), message, author_id)`.
fn derive_commit_id(
    dataset_id: DatasetId,
    parent_commit_id: Option<CommitId>,
    manifest: &[ManifestEntry],
    message: &str,
    author_id: i64,
) -> Result<CommitId> {
    let mut sorted: Vec<(String, String)> = manifest
        .iter()
        .map(|e| (e.logical_row_id.to_string(), e.row_hash.to_hex()))
        .collect();
    sorted.sort();

    let envelope = CommitEnvelope {
        dataset_id,
        parent_commit_id,
        manifest: sorted,
        message,
        author_id,
    };
    let bytes = canonical_json_bytes(&envelope)?;
    Ok(CommitId::of(&bytes))
}
