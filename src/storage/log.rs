use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::models::{FileRecord, FileUpdate, Page, PageQuery};
use super::{clean_json_text, write_atomic, write_json, StoreError};

const EMPTY_LOG: &[u8] = b"[]";

/// The upload log: an ordered list of [`FileRecord`]s rewritten as a whole on
/// every mutation.
///
/// Implementors provide `ensure`, `load` and `save`; the query and mutation
/// operations are built on those. A missing or unparsable log, or one that is
/// not an array, reads as empty and is reset on disk. An array holding a record
/// that does not decode is an error and the log is left as it is.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Create the backing storage if it does not exist yet.
    async fn ensure(&self) -> Result<(), StoreError>;

    async fn load(&self) -> Result<Vec<FileRecord>, StoreError>;

    /// Replace the whole log.
    async fn save(&self, records: &[FileRecord]) -> Result<(), StoreError>;

    /// Add `records` to the end of the log in their given order.
    async fn append(&self, records: Vec<FileRecord>) -> Result<(), StoreError> {
        let mut all = self.load().await?;
        all.extend(records);
        self.save(&all).await
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.load().await?.into_iter().find(|r| r.id == id))
    }

    /// Apply `update` to the record with `id` and persist. Returns the updated
    /// record, or `None` (and writes nothing) if there is no such record. An empty
    /// update leaves the log untouched.
    async fn replace(&self, id: u64, update: FileUpdate) -> Result<Option<FileRecord>, StoreError> {
        let mut all = self.load().await?;
        let Some(record) = all.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(record.clone()));
        }
        update.apply(record);
        let updated = record.clone();

        self.save(&all).await?;
        Ok(Some(updated))
    }

    /// Remove the record with `id` and persist. Returns the removed record.
    async fn remove(&self, id: u64) -> Result<Option<FileRecord>, StoreError> {
        let mut all = self.load().await?;
        let Some(index) = all.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let removed = all.remove(index);

        self.save(&all).await?;
        Ok(Some(removed))
    }

    async fn list_page(&self, query: PageQuery) -> Result<Page, StoreError> {
        Ok(Page::build(self.load().await?, query, false))
    }

    /// Like [`list_page`](Self::list_page) but pulls an out-of-range page back
    /// to the last page (or 1 when the log is empty).
    async fn list_page_clamped(&self, query: PageQuery) -> Result<Page, StoreError> {
        Ok(Page::build(self.load().await?, query, true))
    }
}

/// [`LogStore`] backed by a pretty-printed JSON array file.
#[derive(Debug, Clone)]
pub struct JsonFileLog {
    path: PathBuf,
}

impl JsonFileLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn reset(&self) -> Result<Vec<FileRecord>, StoreError> {
        write_atomic(&self.path, EMPTY_LOG).await?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl LogStore for JsonFileLog {
    async fn ensure(&self) -> Result<(), StoreError> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        write_atomic(&self.path, EMPTY_LOG).await?;
        tracing::info!(path = %self.path.display(), "Created upload log");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<FileRecord>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Upload log unreadable, resetting to empty");
                return self.reset().await;
            }
        };

        let text = clean_json_text(&raw);
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let items = match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "Upload log is not an array, resetting to empty");
                return self.reset().await;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Upload log is not valid JSON, resetting to empty");
                return self.reset().await;
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item).map_err(|source| StoreError::InvalidRecord {
                    path: self.path.clone(),
                    index,
                    source,
                })
            })
            .collect()
    }

    async fn save(&self, records: &[FileRecord]) -> Result<(), StoreError> {
        write_json(&self.path, records).await
    }
}
