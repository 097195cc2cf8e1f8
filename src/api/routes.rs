//! Route wiring for the HTTP adapter (§6). One handler per listed surface
//! operation; each just decodes parameters, calls the core, and shapes the
//! response — no versioning logic lives here.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::commit_builder::CommitBuilder;
use crate::config::Settings;
use crate::errors::RowledgerError;
use crate::hash::CommitId;
use crate::model::dataset::DatasetId;
use crate::model::{TableKey, DEFAULT_BRANCH};
use crate::store::{CommitStore, DatasetStore, JobQueue, RefStore};
use crate::table_reader::TableReader;
use crate::worker::stream_to_temp_file;

use super::dto::*;

/// Everything a handler needs, cloned per request (all fields are `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub datasets: Arc<dyn DatasetStore>,
    pub refs: Arc<dyn RefStore>,
    pub commits: Arc<dyn CommitStore>,
    pub jobs: Arc<dyn JobQueue>,
    pub table_reader: Arc<TableReader>,
    pub commit_builder: Arc<CommitBuilder>,
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/datasets", post(create_dataset).get(list_datasets))
        .route("/datasets/{id}", get(get_dataset))
        .route("/datasets/{id}/overview", get(dataset_overview))
        .route("/datasets/{id}/refs", get(list_refs).post(create_ref))
        .route("/datasets/{id}/refs/{name}", delete(delete_ref))
        .route("/datasets/{id}/refs/{name}/checkout", post(checkout))
        .route("/datasets/{id}/refs/{name}/history", get(commit_history))
        .route("/datasets/{id}/imports", post(enqueue_import))
        .route("/jobs/{job_id}", get(get_job))
        .route("/commits/{commit_id}/tables", get(list_tables))
        .route(
            "/commits/{commit_id}/tables/{table_key}/schema",
            get(table_schema),
        )
        .route(
            "/commits/{commit_id}/tables/{table_key}/rows",
            get(table_data),
        )
        .with_state(state)
}

impl IntoResponse for RowledgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            RowledgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RowledgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            RowledgerError::Conflict(_) => StatusCode::CONFLICT,
            RowledgerError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RowledgerError::Parser { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RowledgerError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            RowledgerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

fn parse_table_key(raw: &str) -> Result<TableKey, RowledgerError> {
    TableKey::new(raw)
}

fn parse_commit_id(raw: &str) -> Result<CommitId, RowledgerError> {
    raw.parse()
        .map_err(|_| RowledgerError::InvalidInput(format!("`{raw}` is not a valid commit id")))
}

async fn create_dataset(
    State(state): State<AppState>,
    Json(req): Json<CreateDatasetRequest>,
) -> Result<Json<DatasetResponse>, RowledgerError> {
    let dataset = state
        .datasets
        .create(req.name, req.description, req.created_by, req.tags)
        .await?;
    state
        .refs
        .create_ref(dataset.id, DEFAULT_BRANCH, None)
        .await?;
    Ok(Json(dataset.into()))
}

async fn list_datasets(
    State(state): State<AppState>,
) -> Result<Json<DatasetListResponse>, RowledgerError> {
    let datasets = state.datasets.list().await?;
    Ok(Json(DatasetListResponse {
        datasets: datasets.into_iter().map(Into::into).collect(),
    }))
}

async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DatasetResponse>, RowledgerError> {
    let dataset = state
        .datasets
        .get(DatasetId(id))
        .await?
        .ok_or_else(|| RowledgerError::not_found("dataset", id.to_string()))?;
    Ok(Json(dataset.into()))
}

async fn list_refs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RefListResponse>, RowledgerError> {
    let refs = state.refs.list_refs(DatasetId(id)).await?;
    Ok(Json(RefListResponse {
        refs: refs.into_iter().map(Into::into).collect(),
    }))
}

async fn create_ref(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateRefRequest>,
) -> Result<Json<RefResponse>, RowledgerError> {
    let dataset_id = DatasetId(id);
    state
        .refs
        .create_ref(dataset_id, &req.name, req.commit_id)
        .await?;
    let created = state
        .refs
        .get_ref(dataset_id, &req.name)
        .await?
        .ok_or_else(|| RowledgerError::internal("ref vanished immediately after creation"))?;
    Ok(Json(created.into()))
}

async fn delete_ref(
    State(state): State<AppState>,
    Path((id, name)): Path<(i64, String)>,
) -> Result<StatusCode, RowledgerError> {
    if name == DEFAULT_BRANCH {
        return Err(RowledgerError::InvalidInput(
            "the default branch cannot be deleted".to_string(),
        ));
    }
    let deleted = state.refs.delete_ref(DatasetId(id), &name).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RowledgerError::not_found("ref", name))
    }
}

/// Moves a ref to a commit the caller already knows about, via CAS — the
/// "checkout a commit" surface operation (§6). Distinct from an import: no
/// new commit is derived, the ref simply advances (or refuses to, on a
/// stale `expected_commit_id`).
async fn checkout(
    State(state): State<AppState>,
    Path((id, name)): Path<(i64, String)>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, RowledgerError> {
    let dataset_id = DatasetId(id);
    if !state.commits.exists(&req.commit_id).await? {
        return Err(RowledgerError::not_found("commit", req.commit_id.to_hex()));
    }
    let advanced = state
        .refs
        .compare_and_set(dataset_id, &name, req.expected_commit_id, req.commit_id)
        .await?;
    Ok(Json(CheckoutResponse { advanced }))
}

async fn commit_history(
    State(state): State<AppState>,
    Path((id, name)): Path<(i64, String)>,
    Query(page): Query<PageParams>,
) -> Result<Json<CommitHistoryResponse>, RowledgerError> {
    let dataset_id = DatasetId(id);
    let entries = state
        .commits
        .history(dataset_id, &name, page.offset, page.limit)
        .await?;
    let total = state.commits.count_ancestors(dataset_id, &name).await?;
    Ok(Json(CommitHistoryResponse {
        entries: entries.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// Streams the uploaded file to a temp file, then enqueues an `import` job
/// pointing at it (§4.8 steps 1-2, §5 "upload streaming"). The worker picks
/// the job up asynchronously; this handler never parses the file itself.
async fn enqueue_import(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<EnqueueImportResponse>, RowledgerError> {
    let dataset_id = DatasetId(id);
    let mut fields: Option<EnqueueImportFields> = None;
    let mut temp_path: Option<std::path::PathBuf> = None;
    let mut filename = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RowledgerError::InvalidInput(e.to_string()))?
    {
        match field.name() {
            // Streamed straight to disk in chunks (§4.8 "upload streaming",
            // §5 "peak resident memory bounded by batch size, not file
            // size") rather than buffered as one in-memory `Bytes`.
            Some("file") => {
                filename = field.file_name().unwrap_or("upload").to_string();
                temp_path = Some(
                    stream_to_temp_file(
                        &state.settings.temp_upload_dir,
                        dataset_id,
                        &filename,
                        state.settings.max_upload_size_bytes,
                        field,
                    )
                    .await?,
                );
            }
            Some("fields") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| RowledgerError::InvalidInput(e.to_string()))?;
                fields = Some(serde_json::from_str(&raw).map_err(|e| {
                    RowledgerError::InvalidInput(format!("malformed `fields` part: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let path = temp_path
        .ok_or_else(|| RowledgerError::InvalidInput("missing `file` part".to_string()))?;
    let fields = fields
        .ok_or_else(|| RowledgerError::InvalidInput("missing `fields` part".to_string()))?;

    let run_parameters = serde_json::to_value(crate::model::ImportRunParameters {
        dataset_id,
        target_ref: fields.target_ref,
        temp_file_path: path.to_string_lossy().to_string(),
        filename,
        commit_message: fields.commit_message,
        user_id: fields.user_id,
        file_size: path
            .metadata()
            .map(|m| m.len())
            .unwrap_or_default(),
    })
    .map_err(RowledgerError::internal)?;

    let job_id = state
        .jobs
        .enqueue(
            crate::model::RunType::Import,
            dataset_id,
            fields.user_id,
            None,
            run_parameters,
        )
        .await?;

    Ok(Json(EnqueueImportResponse { job_id }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<uuid::Uuid>,
) -> Result<Json<JobResponse>, RowledgerError> {
    let job = state
        .jobs
        .get(job_id)
        .await?
        .ok_or_else(|| RowledgerError::not_found("job", job_id.to_string()))?;
    Ok(Json(job.into()))
}

async fn list_tables(
    State(state): State<AppState>,
    Path(commit_id): Path<String>,
) -> Result<Json<TableListResponse>, RowledgerError> {
    let commit_id = parse_commit_id(&commit_id)?;
    let tables = state.table_reader.list_table_keys(&commit_id).await?;
    Ok(Json(TableListResponse { tables }))
}

async fn table_schema(
    State(state): State<AppState>,
    Path((commit_id, table_key)): Path<(String, String)>,
) -> Result<Json<TableSchemaResponse>, RowledgerError> {
    let commit_id = parse_commit_id(&commit_id)?;
    let table_key = parse_table_key(&table_key)?;
    let schema = state
        .table_reader
        .get_table_schema(&commit_id, &table_key)
        .await?;
    Ok(Json(TableSchemaResponse { schema }))
}

async fn table_data(
    State(state): State<AppState>,
    Path((commit_id, table_key)): Path<(String, String)>,
    Query(page): Query<PageParams>,
) -> Result<Json<TableDataResponse>, RowledgerError> {
    let commit_id = parse_commit_id(&commit_id)?;
    let table_key = parse_table_key(&table_key)?;
    let rows = state
        .table_reader
        .get_table_data(&commit_id, &table_key, page.offset, page.limit)
        .await?;
    let total = state
        .table_reader
        .count_table_rows(&commit_id, &table_key)
        .await?;
    Ok(Json(TableDataResponse {
        rows: rows.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// Bulk per-ref, per-table row counts for a dataset in one round trip
/// (SPEC_FULL "bulk dataset-overview metadata"), backed by
/// `TableReader::batch_get_table_metadata` rather than N+1 individual calls.
async fn dataset_overview(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DatasetOverviewResponse>, RowledgerError> {
    let dataset_id = DatasetId(id);
    let refs = state.refs.list_refs(dataset_id).await?;
    let commit_ids: Vec<CommitId> = refs.iter().filter_map(|r| r.commit_id).collect();
    let counts = state.table_reader.batch_get_table_metadata(&commit_ids).await?;

    let mut overviews = Vec::with_capacity(refs.len());
    for r in refs {
        let tables = match r.commit_id {
            Some(commit_id) => counts
                .iter()
                .filter(|(c, _, _)| *c == commit_id)
                .map(|(_, table_key, row_count)| TableOverview {
                    table_key: table_key.clone(),
                    row_count: *row_count,
                })
                .collect(),
            None => Vec::new(),
        };
        overviews.push(RefOverview {
            ref_name: r.name,
            commit_id: r.commit_id,
            tables,
        });
    }

    Ok(Json(DatasetOverviewResponse {
        dataset_id,
        refs: overviews,
    }))
}
