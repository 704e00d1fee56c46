use axum::extract::{Multipart, Path, State};
use axum::Json;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{multipart_error, parse_id, store_error};
use crate::api::response::{ApiError, AppQuery, Message, Success};
use crate::storage::models::{FileRecord, FileUpdate, Page, PageQuery, SortField, SortOrder};
use crate::upload::{naming, IncomingFile, UploadError};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub file: FileRecord,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub data: Page,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileParams {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// Zero or missing paging values fall back to page 1 and the configured page size.
fn page_query(
    state: &AppState,
    page: Option<u32>,
    per_page: Option<u32>,
    sort_by: SortField,
    sort_order: SortOrder,
) -> PageQuery {
    PageQuery {
        page: page.filter(|p| *p > 0).unwrap_or(1),
        per_page: per_page
            .filter(|p| *p > 0)
            .unwrap_or(state.config.default_per_page),
        sort_by,
        sort_order,
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Success<UploadResponse>>, ApiError> {
    let files = read_upload_fields(&state, &mut multipart).await?;

    let received = files.len();
    let outcome = state
        .pipeline
        .handle_upload(files)
        .await
        .map_err(upload_error)?;
    if outcome.failed > 0 {
        tracing::warn!(
            received,
            recorded = outcome.succeeded.len(),
            "Upload partially recorded"
        );
    }

    Ok(Success::new(UploadResponse {
        files: outcome.succeeded,
    }))
}

/// Collect every `files` field of the request, stopping once the file count
/// limit is exceeded.
async fn read_upload_fields(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<Vec<IncomingFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Invalid multipart data"))?
    {
        if field.name() != Some("files") {
            // Ignore unknown fields
            continue;
        }

        if files.len() >= state.pipeline.max_files() {
            return Err(upload_error(UploadError::TooManyFiles {
                max: state.pipeline.max_files(),
            }));
        }

        let declared_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, "Failed to read file"))?;
        files.push(IncomingFile {
            declared_name,
            data,
        });
    }
    Ok(files)
}

pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Success<UpdateResponse>>, ApiError> {
    let id = parse_id(&id, "File not found")?;

    let mut original_name: Option<String> = None;
    let mut upload_date: Option<String> = None;
    let mut status: Option<String> = None;
    let mut replacement: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Invalid multipart data"))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let declared_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "Failed to read file"))?;
                replacement = Some((declared_name, data));
            }
            "originalName" => original_name = Some(text_field(field, "originalName").await?),
            "uploadDate" => upload_date = Some(text_field(field, "uploadDate").await?),
            "status" => status = Some(text_field(field, "status").await?),
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let upload_date = upload_date
        .filter(|d| !d.trim().is_empty())
        .map(|d| {
            DateTime::parse_from_rfc3339(d.trim())
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| {
                    ApiError::bad_request("uploadDate must be an ISO-8601 timestamp").with_detail(e)
                })
        })
        .transpose()?;

    let existing = state
        .log
        .find_by_id(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let mut update = FileUpdate {
        original_name: original_name.filter(|n| !n.trim().is_empty()),
        status: status.filter(|s| !s.trim().is_empty()),
        upload_date,
        ..Default::default()
    };

    let mut staged = None;
    if let Some((declared_name, data)) = replacement {
        state.pipeline.prepare().await.map_err(upload_error)?;
        let file = state
            .pipeline
            .stage(&declared_name, data)
            .await
            .map_err(upload_error)?;

        if let Err(e) = state.object_store.delete(&existing.file_name).await {
            tracing::warn!(file_name = %existing.file_name, error = %e, "Failed to delete replaced file");
        }

        update.file_type = Some(naming::file_type(&file.file_name));
        update.file_name = Some(file.file_name.clone());
        update.file_size = Some(file.size);
        update.upload_date = update.upload_date.or_else(|| Some(Utc::now()));
        staged = Some(file);
    }

    match state.log.replace(id, update).await {
        Ok(Some(file)) => {
            tracing::debug!(file_id = id, "Updated file");
            Ok(Success::new(UpdateResponse { file }))
        }
        Ok(None) => {
            state.pipeline.discard(staged.as_slice()).await;
            Err(ApiError::not_found("File not found"))
        }
        Err(e) => {
            state.pipeline.discard(staged.as_slice()).await;
            Err(store_error(e))
        }
    }
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<Page>, ApiError> {
    let sort_by = match params.sort_by.as_deref() {
        Some(s) if !s.is_empty() => s.parse::<SortField>().map_err(ApiError::bad_request)?,
        _ => SortField::default(),
    };
    let sort_order = match params.sort_order.as_deref() {
        Some(s) if !s.is_empty() => s.parse::<SortOrder>().map_err(ApiError::bad_request)?,
        _ => SortOrder::default(),
    };

    let query = page_query(&state, params.page, params.per_page, sort_by, sort_order);
    let page = state.log.list_page(query).await.map_err(store_error)?;
    Ok(Json(page))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppQuery(params): AppQuery<DeleteFileParams>,
) -> Result<Json<Success<DeleteResponse>>, ApiError> {
    let id = parse_id(&id, "File not found")?;

    let removed = state
        .log
        .remove(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if let Err(e) = state.object_store.delete(&removed.file_name).await {
        tracing::warn!(file_name = %removed.file_name, error = %e, "Failed to delete file from storage");
    }

    let query = page_query(
        &state,
        params.page,
        params.per_page,
        SortField::Id,
        SortOrder::Desc,
    );
    let data = state
        .log
        .list_page_clamped(query)
        .await
        .map_err(store_error)?;

    tracing::debug!(file_id = id, "Deleted file");
    Ok(Success::new(DeleteResponse {
        message: "File deleted".to_string(),
        data,
    }))
}

pub async fn reset_id(State(state): State<Arc<AppState>>) -> Result<Json<Message>, ApiError> {
    state
        .ids
        .reset(0)
        .await
        .map_err(|e| ApiError::internal("Failed to reset ID counter").with_detail(e))?;

    Ok(Message::new("ID counter reset"))
}

// ============================================================================
// Helpers
// ============================================================================

async fn text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| multipart_error(e, &format!("Invalid {name}")))
}

fn upload_error(e: UploadError) -> ApiError {
    let api_error = match &e {
        UploadError::NoFiles => ApiError::bad_request("No files received"),
        UploadError::TooManyFiles { .. } => ApiError::bad_request("Too many files in one upload"),
        UploadError::FileTooLarge { .. } => ApiError::payload_too_large("File is too large"),
        UploadError::LockBusy { .. } => {
            ApiError::unavailable("Upload log is busy, please retry shortly")
        }
        UploadError::Setup(_)
        | UploadError::Persistence(_)
        | UploadError::Storage(_)
        | UploadError::Aborted(_) => ApiError::internal("Upload failed"),
    };
    api_error.with_detail(e)
}
