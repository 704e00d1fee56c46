//! The upload pipeline: stage payloads, then record them in the upload log
//! under the upload lock.

pub mod naming;
mod pipeline;

pub use pipeline::{IncomingFile, StagedFile, UploadOutcome, UploadPipeline};

use thiserror::Error;

use crate::object_store::ObjectStoreError;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to prepare upload storage: {0}")]
    Setup(#[source] StoreError),
    #[error("No files received")]
    NoFiles,
    #[error("Too many files, at most {max} per upload")]
    TooManyFiles { max: usize },
    #[error("File '{name}' exceeds maximum upload size of {max} bytes")]
    FileTooLarge { name: String, max: u64 },
    #[error("Upload log is locked, gave up after {attempts} attempts")]
    LockBusy { attempts: u32 },
    #[error("Failed to write upload log: {0}")]
    Persistence(#[source] StoreError),
    #[error("Failed to store file: {0}")]
    Storage(#[from] ObjectStoreError),
    #[error("Upload task aborted: {0}")]
    Aborted(String),
}
