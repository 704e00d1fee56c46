mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path};
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

/// A readable object together with its length in bytes.
pub struct ObjectReader {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub size: u64,
}

/// Abstraction over the payload storage.
/// Keys are relative paths such as the generated upload names or `imgStyles/3_STYLE_A.png`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    async fn open(&self, key: &str) -> Result<ObjectReader, ObjectStoreError>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}

/// Reject empty keys and keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let path = Path::new(key);
    let plain = !key.is_empty()
        && !key.contains('\\')
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(ObjectStoreError::InvalidKey(key.to_string()))
    }
}
