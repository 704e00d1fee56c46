//! file-panel - Upload log and content-block backend for a web admin panel
//!
//! This crate provides:
//! - Multi-file upload into a local payload directory
//! - A JSON upload log guarded by a lock file, with monotonic record ids
//! - Paged, sorted listing plus update and delete of uploaded files
//! - The image-scroll content-block document with per-block style images
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod content;
pub mod object_store;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod upload;

use std::sync::Arc;

use config::Config;
use content::ContentStore;
use object_store::ObjectStore;
use storage::{IdAllocator, JsonFileLog, LogStore};
use upload::UploadPipeline;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub log: Arc<dyn LogStore>,
    pub ids: IdAllocator,
    pub pipeline: UploadPipeline,
    pub object_store: Arc<dyn ObjectStore>,
    pub content: ContentStore,
}

impl AppState {
    /// Wire the stores described by `config` around `object_store`.
    pub fn new(config: Config, object_store: Arc<dyn ObjectStore>) -> Self {
        let json_log = JsonFileLog::new(config.storage.log_path());
        let ids = IdAllocator::new(config.storage.id_counter_path());
        tracing::info!(
            log = %json_log.path().display(),
            id_counter = %ids.path().display(),
            "Upload log state files"
        );

        let log: Arc<dyn LogStore> = Arc::new(json_log);
        let pipeline = UploadPipeline::new(
            &config,
            Arc::clone(&log),
            ids.clone(),
            Arc::clone(&object_store),
        );
        let content = ContentStore::new(
            config.storage.content_path(),
            IdAllocator::with_key(
                config.storage.content_counter_path(),
                content::BLOCK_COUNTER_KEY,
            ),
            Arc::clone(&object_store),
        );

        Self {
            config,
            log,
            ids,
            pipeline,
            object_store,
            content,
        }
    }
}
