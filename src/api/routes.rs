use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.upload_body_limit();
    let file_limit = state.config.upload.max_file_size as usize + 1024 * 1024;

    let api = Router::new()
        // Upload pipeline
        .route(
            "/upload",
            post(handlers::upload_files).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/upload/check",
            get(handlers::upload_check).post(handlers::upload_check),
        )
        .route("/reset-id", post(handlers::reset_id))
        // Files
        .route("/files", get(handlers::list_files))
        .route(
            "/files/:id",
            put(handlers::update_file).layer(DefaultBodyLimit::max(file_limit)),
        )
        .route("/files/:id", delete(handlers::delete_file))
        // Payloads
        .route("/download/:filename", get(handlers::download_file))
        .route("/uploads/*key", get(handlers::serve_upload))
        // Image scroll content
        .route(
            "/imgscroll",
            get(handlers::get_content).put(handlers::update_content),
        )
        .route("/imgscroll/block", post(handlers::add_block))
        .route(
            "/imgscroll/block/:index_part_id",
            delete(handlers::delete_block),
        )
        .route(
            "/imgscroll/upload/:index_part_id/:style",
            post(handlers::upload_style_image).layer(DefaultBodyLimit::max(file_limit)),
        )
        // Probes
        .route("/test", get(handlers::api_test))
        .route("/health", get(handlers::health));

    let mut router = Router::new().nest("/api", api);

    if let Some(cors) = cors_layer(&state.config.server.cors_origins) {
        router = router.layer(cors);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true),
    )
}
