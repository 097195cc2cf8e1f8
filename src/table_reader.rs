//! Table Reader (§4.5): resolves a `(commit, table_key)` to paginated or
//! streamed rows, plus schema and bulk overview metadata.

use std::sync::Arc;

use futures::stream::{self, Stream};

use crate::errors::{Result, RowledgerError};
use crate::hash::CommitId;
use crate::model::{LogicalRowId, Row, TableKey, TableSchema};
use crate::store::{ManifestStore, SchemaStore};

/// One row returned by the table reader: the manifest-joined row plus its
/// `logical_row_id` for disambiguation (§4.5 `get_table_data`).
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub logical_row_id: LogicalRowId,
    pub row: Row,
}

pub struct TableReader {
    manifest_store: Arc<dyn ManifestStore>,
    schema_store: Arc<dyn SchemaStore>,
}

impl TableReader {
    pub fn new(manifest_store: Arc<dyn ManifestStore>, schema_store: Arc<dyn SchemaStore>) -> Self {
        TableReader {
            manifest_store,
            schema_store,
        }
    }

    pub async fn list_table_keys(&self, commit_id: &CommitId) -> Result<Vec<TableKey>> {
        self.manifest_store.list_table_keys(commit_id).await
    }

    pub async fn get_table_schema(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
    ) -> Result<TableSchema> {
        self.schema_store
            .table_schema(commit_id, table_key)
            .await?
            .ok_or_else(|| RowledgerError::not_found("table", table_key.to_string()))
    }

    pub async fn count_table_rows(&self, commit_id: &CommitId, table_key: &TableKey) -> Result<u64> {
        self.manifest_store.count_rows(commit_id, table_key).await
    }

    /// `offset >= total` returns an empty page, never an error (§8 boundary
    /// behavior).
    pub async fn get_table_data(
        &self,
        commit_id: &CommitId,
        table_key: &TableKey,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TableRow>> {
        let page = self
            .manifest_store
            .page(commit_id, table_key, offset, limit)
            .await?;
        Ok(page
            .into_iter()
            .map(|(logical_row_id, row)| TableRow { logical_row_id, row })
            .collect())
    }

    /// Cursor-style batches over the whole table, restartable by re-issuing
    /// with the offset the caller last consumed (§4.5 `get_table_data_stream`).
    /// This is the sole hand-off point for profiling/sampling code reading
    /// column values off a commit — the versioning engine does not sample or
    /// infer types itself (§1 Non-goals).
    pub fn get_table_data_stream(
        self: Arc<Self>,
        commit_id: CommitId,
        table_key: TableKey,
        batch_size: u64,
    ) -> impl Stream<Item = Result<Vec<TableRow>>> {
        stream::unfold(Some(0u64), move |offset| {
            let reader = self.clone();
            let commit_id = commit_id;
            let table_key = table_key.clone();
            async move {
                let offset = offset?;
                match reader
                    .get_table_data(&commit_id, &table_key, offset, batch_size)
                    .await
                {
                    Ok(batch) if batch.is_empty() => None,
                    Ok(batch) => {
                        let consumed = batch.len() as u64;
                        Some((Ok(batch), Some(offset + consumed)))
                    }
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }

    /// Bulk `(commit_id, table_key) -> row_count` for dataset-overview
    /// endpoints, one round trip regardless of how many commits are asked
    /// about (SPEC_FULL "bulk dataset-overview metadata").
    pub async fn batch_get_table_metadata(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<(CommitId, TableKey, u64)>> {
        self.manifest_store.batch_row_counts(commit_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit_builder::{CommitBuilder, LogicalTable};
    use crate::model::dataset::DatasetId;
    use crate::model::{ColumnDef, ColumnType};
    use crate::store::fakes::{FakeCommitStore, FakeRowStore};
    use crate::value::{CellValue, RowValue};
    use futures::StreamExt;

    async fn commit_with_rows(n: i64) -> (Arc<FakeCommitStore>, CommitId) {
        let rows = Arc::new(FakeRowStore::default());
        let commits = Arc::new(FakeCommitStore::default());
        let builder = CommitBuilder::new(rows, commits.clone());
        let table = LogicalTable {
            table_key: TableKey::primary(),
            schema: TableSchema {
                columns: vec![ColumnDef {
                    name: "id".to_string(),
                    column_type: ColumnType::Integer,
                }],
            },
            rows: (0..n)
                .map(|v| RowValue::new(vec![("id".to_string(), CellValue::Integer(v))]))
                .collect(),
        };
        let commit_id = builder
            .create_commit(DatasetId(1), None, vec![table], "m".into(), 1, 10_000)
            .await
            .unwrap();
        (commits, commit_id)
    }

    #[tokio::test]
    async fn offset_past_end_returns_empty_not_error() {
        let (commits, commit_id) = commit_with_rows(3).await;
        let reader = TableReader::new(commits.clone(), commits);
        let page = reader
            .get_table_data(&commit_id, &TableKey::primary(), 100, 10)
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn stream_yields_every_row_in_order_across_batches() {
        let (commits, commit_id) = commit_with_rows(9).await;
        let reader = Arc::new(TableReader::new(commits.clone(), commits));
        let batches: Vec<_> = reader
            .get_table_data_stream(commit_id, TableKey::primary(), 4)
            .collect()
            .await;

        let mut indices = Vec::new();
        for batch in batches {
            for row in batch.unwrap() {
                indices.push(row.logical_row_id.index);
            }
        }
        assert_eq!(indices, (0..9).collect::<Vec<_>>());
    }
}
