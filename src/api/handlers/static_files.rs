use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::AppState;

/// Download a stored payload as an attachment.
/// Route: GET /download/:filename
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    stream_object(&state, &filename, "attachment").await
}

/// Serve a stored payload inline.
/// Route: GET /uploads/*key
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let mut response = stream_object(&state, &key, "inline").await?;

    // Stored names are unique per upload, so content never changes under a name
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=3600"),
    );
    Ok(response)
}

async fn stream_object(state: &AppState, key: &str, disposition: &str) -> Result<Response, ApiError> {
    let object = state.object_store.open(key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) => ApiError::not_found("File does not exist"),
        ObjectStoreError::InvalidKey(_) => ApiError::bad_request("Invalid file name"),
        _ => ApiError::internal("Failed to read file").with_detail(e),
    })?;

    let body = Body::from_stream(ReaderStream::new(object.reader));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    let mime = mime_guess::from_path(key).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        mime.as_ref()
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(object.size));

    let filename = key.rsplit('/').next().unwrap_or(key);
    if let Ok(value) = format!("{disposition}; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
