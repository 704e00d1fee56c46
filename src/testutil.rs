//! Shared test helpers for file-panel router tests.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageConfig, UploadConfig};
use crate::object_store::LocalStore;
use crate::storage::RetryPolicy;
use crate::AppState;

pub const BOUNDARY: &str = "file-panel-test-boundary";

/// Config rooted in `temp_dir` with a short lock retry budget.
pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        storage: StorageConfig {
            data_dir: temp_dir.path().join("data"),
            uploads_dir: temp_dir.path().join("uploads"),
        },
        upload: UploadConfig {
            lock_retry: RetryPolicy {
                max_attempts: 3,
                interval: Duration::from_millis(10),
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Create a test AppState with temporary data and upload directories.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(test_config(temp_dir))
}

/// Create a test AppState from an adjusted [`test_config`].
pub fn test_state_with(config: Config) -> Arc<AppState> {
    let object_store =
        LocalStore::new(&config.storage.uploads_dir).expect("Failed to create test object store");
    Arc::new(AppState::new(config, Arc::new(object_store)))
}

/// One part of a multipart/form-data body.
pub enum Part<'a> {
    File {
        field: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        field: &'a str,
        value: &'a str,
    },
}

/// Encode `parts` as a multipart body delimited by [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                field,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { field, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
