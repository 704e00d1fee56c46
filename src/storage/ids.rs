use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use super::write_atomic;

/// Key under which the file-record counter is persisted.
pub const FILE_COUNTER_KEY: &str = "currentId";

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Failed to persist id counter {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Id counter {path} is exhausted")]
    Exhausted { path: PathBuf },
}

/// Monotonic integer ids backed by a small JSON counter file (`{"currentId": N}`).
///
/// Read-increment-write is not atomic across callers; callers that allocate
/// concurrently must serialize through the upload lock.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    path: PathBuf,
    key: String,
}

impl IdAllocator {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_key(path, FILE_COUNTER_KEY)
    }

    /// Allocator persisting its counter under a custom JSON key.
    pub fn with_key<P: AsRef<Path>>(path: P, key: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            key: key.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current counter value. An absent or unreadable counter reads as 0.
    pub async fn current(&self) -> u64 {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Id counter unreadable, starting from 0");
                return 0;
            }
        };

        match serde_json::from_str::<Value>(super::clean_json_text(&raw)) {
            Ok(value) => value.get(&self.key).and_then(Value::as_u64).unwrap_or(0),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Id counter corrupt, starting from 0");
                0
            }
        }
    }

    /// Allocate the next id and persist it as the new counter value.
    pub async fn next_id(&self) -> Result<u64, AllocationError> {
        let next = self
            .current()
            .await
            .checked_add(1)
            .ok_or_else(|| AllocationError::Exhausted {
                path: self.path.clone(),
            })?;
        self.store(next).await?;
        Ok(next)
    }

    /// Overwrite the counter unconditionally.
    pub async fn reset(&self, value: u64) -> Result<(), AllocationError> {
        self.store(value).await?;
        tracing::info!(path = %self.path.display(), value, "Id counter reset");
        Ok(())
    }

    async fn store(&self, value: u64) -> Result<(), AllocationError> {
        let mut body = Map::new();
        body.insert(self.key.clone(), Value::from(value));
        let data = Value::Object(body).to_string();

        write_atomic(&self.path, data.as_bytes())
            .await
            .map_err(|source| AllocationError::Persist {
                path: self.path.clone(),
                source,
            })
    }
}
