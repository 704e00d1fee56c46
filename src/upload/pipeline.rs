use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;

use super::naming;
use super::UploadError;
use crate::config::Config;
use crate::object_store::ObjectStore;
use crate::storage::models::{FileRecord, STATUS_COMPLETE};
use crate::storage::{IdAllocator, LockFile, LogStore, RetryPolicy, StoreError};

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub declared_name: String,
    pub data: Bytes,
}

/// A payload written to file storage but not yet recorded in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub file_name: String,
    pub original_name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub succeeded: Vec<FileRecord>,
    /// Staged files that were skipped because no id could be allocated
    pub failed: usize,
}

#[derive(Clone)]
pub struct UploadPipeline {
    log: Arc<dyn LogStore>,
    ids: IdAllocator,
    lock: LockFile,
    objects: Arc<dyn ObjectStore>,
    uploads_dir: PathBuf,
    max_file_size: u64,
    max_files: usize,
    uploader_name: String,
    lock_retry: RetryPolicy,
}

impl UploadPipeline {
    pub fn new(
        config: &Config,
        log: Arc<dyn LogStore>,
        ids: IdAllocator,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            log,
            ids,
            lock: LockFile::new(config.storage.lock_path()),
            objects,
            uploads_dir: config.storage.uploads_dir.clone(),
            max_file_size: config.upload.max_file_size,
            max_files: config.upload.max_files,
            uploader_name: config.upload.uploader_name.clone(),
            lock_retry: config.upload.lock_retry,
        }
    }

    pub fn lock_file(&self) -> &LockFile {
        &self.lock
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Create the storage directory and the upload log if they are missing.
    pub async fn prepare(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|e| UploadError::Setup(StoreError::Io(e)))?;
        self.log.ensure().await.map_err(UploadError::Setup)
    }

    /// Write one payload to file storage under a generated name.
    pub async fn stage(&self, declared_name: &str, data: Bytes) -> Result<StagedFile, UploadError> {
        let original_name = naming::correct_declared_name(declared_name);
        if data.len() as u64 > self.max_file_size {
            return Err(UploadError::FileTooLarge {
                name: original_name,
                max: self.max_file_size,
            });
        }

        let file_name = naming::generate_stored_name(&original_name);
        let size = data.len() as u64;
        self.objects.put(&file_name, data).await?;

        tracing::debug!(file_name = %file_name, size, "Staged file");
        Ok(StagedFile {
            file_name,
            original_name,
            size,
        })
    }

    /// Best-effort removal of staged payloads that will not be recorded.
    pub async fn discard(&self, staged: &[StagedFile]) {
        for file in staged {
            if let Err(e) = self.objects.delete(&file.file_name).await {
                tracing::warn!(file_name = %file.file_name, error = %e, "Failed to remove staged file");
            }
        }
    }

    /// Record staged files in the upload log while holding the upload lock.
    ///
    /// Files whose id allocation fails are skipped. If the lock cannot be
    /// taken the staged payloads stay on disk.
    pub async fn commit(&self, staged: Vec<StagedFile>) -> Result<UploadOutcome, UploadError> {
        if staged.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let guard = self
            .lock
            .lock(self.lock_retry)
            .await
            .map_err(|e| UploadError::Setup(StoreError::Io(e)))?
            .ok_or(UploadError::LockBusy {
                attempts: self.lock_retry.max_attempts,
            })?;

        // Run detached so a dropped request cannot stop the critical section halfway.
        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            let result = pipeline.record(staged).await;
            guard.release().await;
            result
        });

        task.await
            .map_err(|e| UploadError::Aborted(e.to_string()))?
    }

    /// Stage and commit a batch of in-memory files.
    pub async fn handle_upload(
        &self,
        files: Vec<IncomingFile>,
    ) -> Result<UploadOutcome, UploadError> {
        self.prepare().await?;

        if files.len() > self.max_files {
            return Err(UploadError::TooManyFiles {
                max: self.max_files,
            });
        }

        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            match self.stage(&file.declared_name, file.data).await {
                Ok(s) => staged.push(s),
                Err(e) => {
                    self.discard(&staged).await;
                    return Err(e);
                }
            }
        }

        self.commit(staged).await
    }

    async fn record(&self, staged: Vec<StagedFile>) -> Result<UploadOutcome, UploadError> {
        let existing = self.log.load().await.map_err(UploadError::Persistence)?;
        let received = staged.len();

        let mut records = Vec::with_capacity(received);
        for file in staged {
            let id = match self.ids.next_id().await {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(file_name = %file.file_name, error = %e, "Skipping file, no id allocated");
                    continue;
                }
            };

            if existing.iter().any(|r| r.id == id) {
                tracing::warn!(id, "Allocated id already present in upload log; was the counter reset?");
            }

            records.push(FileRecord {
                id,
                file_type: naming::file_type(&file.file_name),
                file_name: file.file_name,
                original_name: file.original_name,
                upload_date: Utc::now(),
                file_size: file.size,
                uploader_name: self.uploader_name.clone(),
                status: STATUS_COMPLETE.to_string(),
            });
        }

        if !records.is_empty() {
            self.log
                .append(records.clone())
                .await
                .map_err(UploadError::Persistence)?;
        }

        let failed = received - records.len();
        tracing::info!(
            recorded = records.len(),
            failed,
            log_size = existing.len() + records.len(),
            "Upload committed"
        );

        Ok(UploadOutcome {
            succeeded: records,
            failed,
        })
    }
}
