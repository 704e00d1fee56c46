use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{multipart_error, parse_id};
use crate::api::response::{ApiError, AppJson, Success};
use crate::content::{ContentError, ScrollDocument};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ContentResponse<T: Serialize> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn content_response<T: Serialize>(
    message: &str,
    data: Option<T>,
) -> Json<Success<ContentResponse<T>>> {
    Success::new(ContentResponse {
        message: message.to_string(),
        data,
    })
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_content(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScrollDocument>, ApiError> {
    let doc = state.content.get().await.map_err(content_error)?;
    Ok(Json(doc))
}

pub async fn update_content(
    State(state): State<Arc<AppState>>,
    AppJson(doc): AppJson<ScrollDocument>,
) -> Result<Json<Success<ContentResponse<()>>>, ApiError> {
    state.content.replace(&doc).await.map_err(content_error)?;
    Ok(content_response("Content updated", None))
}

pub async fn add_block(
    State(state): State<Arc<AppState>>,
    AppJson(fields): AppJson<Map<String, Value>>,
) -> Result<Json<Success<ContentResponse<ScrollDocument>>>, ApiError> {
    let doc = state.content.add_block(fields).await.map_err(content_error)?;
    Ok(content_response("Block added", Some(doc)))
}

pub async fn delete_block(
    State(state): State<Arc<AppState>>,
    Path(index_part_id): Path<String>,
) -> Result<Json<Success<ContentResponse<ScrollDocument>>>, ApiError> {
    let id = parse_id(&index_part_id, "Block not found")?;
    let doc = state
        .content
        .delete_block(id)
        .await
        .map_err(content_error)?;
    Ok(content_response("Block deleted", Some(doc)))
}

pub async fn upload_style_image(
    State(state): State<Arc<AppState>>,
    Path((index_part_id, style)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<Success<ContentResponse<String>>>, ApiError> {
    let id = parse_id(&index_part_id, "Block not found")?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Invalid multipart data"))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, "Failed to read image"))?;
        image = Some((content_type, data));
    }

    let (content_type, data) = image.ok_or_else(|| ApiError::bad_request("No image received"))?;
    if data.len() as u64 > state.config.upload.max_file_size {
        return Err(ApiError::payload_too_large("Image is too large"));
    }

    let stored = state
        .content
        .store_style_image(id, &style, &content_type, data)
        .await
        .map_err(content_error)?;
    Ok(content_response("Image uploaded", Some(stored)))
}

// ============================================================================
// Helpers
// ============================================================================

fn content_error(e: ContentError) -> ApiError {
    let api_error = match &e {
        ContentError::NotFound(_) => ApiError::not_found("Block not found"),
        ContentError::UnsupportedType(_) => {
            ApiError::unsupported_media_type("Only jpg, png, gif and svg images are allowed")
        }
        ContentError::UnknownStyle(_) => ApiError::bad_request("Unknown style"),
        ContentError::Store(_) | ContentError::Allocation(_) | ContentError::Storage(_) => {
            ApiError::internal("Failed to update content")
        }
    };
    api_error.with_detail(e)
}
