use axum::Json;
use serde::Serialize;

use crate::api::response::Message;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub status: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Probe used by the panel before it starts an upload.
pub async fn upload_check() -> Json<CheckResponse> {
    Json(CheckResponse {
        status: "ok".to_string(),
    })
}

pub async fn api_test() -> Json<Message> {
    Message::new("API server is running")
}
