mod admin;
mod content;
mod files;
mod static_files;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use crate::api::response::ApiError;
use crate::storage::StoreError;

pub use admin::{api_test, health, upload_check};
pub use content::{add_block, delete_block, get_content, update_content, upload_style_image};
pub use files::{delete_file, list_files, reset_id, update_file, upload_files};
pub use static_files::{download_file, serve_upload};

/// Parse a numeric path id. Anything that is not an id cannot name an existing
/// record, so it is reported as not found.
fn parse_id(raw: &str, not_found: &str) -> Result<u64, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found(not_found))
}

/// Map a StoreError to an ApiError
fn store_error(e: StoreError) -> ApiError {
    ApiError::internal("Failed to access the upload log").with_detail(e)
}

/// Map a multipart read failure, reporting a body over the route limit as 413.
fn multipart_error(e: MultipartError, message: &str) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body is too large").with_detail(e.body_text())
    } else {
        ApiError::bad_request(message).with_detail(e)
    }
}
