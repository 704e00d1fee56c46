//! Image-scroll content blocks: a JSON document holding an ordered block list,
//! plus per-block style images kept in file storage.
//!
//! Unlike the upload log this store takes no lock; the last write wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::{clean_json_text, write_json, AllocationError, IdAllocator, StoreError};

/// Key under which the block counter is persisted.
pub const BLOCK_COUNTER_KEY: &str = "currentIndexPartId";

/// Directory (object key prefix) for style images.
pub const STYLE_DIR: &str = "imgStyles";

/// Styles a block can carry an image for.
pub const STYLES: [&str; 2] = ["STYLE_A", "STYLE_B"];

const IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/svg+xml", "svg"),
];

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Block {0} not found")]
    NotFound(u64),
    #[error("Unsupported image type '{0}', only jpg, png, gif and svg are allowed")]
    UnsupportedType(String),
    #[error("Unknown style '{0}'")]
    UnknownStyle(String),
    #[error("Failed to read or write content document: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to allocate block id: {0}")]
    Allocation(#[from] AllocationError),
    #[error("Failed to store style image: {0}")]
    Storage(#[from] ObjectStoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollDocument {
    #[serde(default)]
    pub index_part_list: Vec<ContentBlock>,
    /// Any other top-level keys, kept as they are
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub index_part_id: u64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub struct ContentStore {
    path: PathBuf,
    counter: IdAllocator,
    objects: Arc<dyn ObjectStore>,
}

/// File name of a style image inside [`STYLE_DIR`].
pub fn style_image_name(block_id: u64, style: &str, ext: &str) -> String {
    format!("{block_id}_{style}.{ext}")
}

fn style_image_key(block_id: u64, style: &str, ext: &str) -> String {
    format!("{STYLE_DIR}/{}", style_image_name(block_id, style, ext))
}

impl ContentStore {
    pub fn new<P: AsRef<Path>>(
        path: P,
        counter: IdAllocator,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            counter,
            objects,
        }
    }

    /// The current document. A missing document reads as empty.
    pub async fn get(&self) -> Result<ScrollDocument, ContentError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ScrollDocument::default()),
            Err(e) => return Err(StoreError::Io(e).into()),
        };

        let text = clean_json_text(&raw);
        if text.is_empty() {
            return Ok(ScrollDocument::default());
        }
        Ok(serde_json::from_str(text).map_err(StoreError::from)?)
    }

    pub async fn replace(&self, doc: &ScrollDocument) -> Result<(), ContentError> {
        write_json(&self.path, doc).await?;
        tracing::debug!(blocks = doc.index_part_list.len(), "Replaced content document");
        Ok(())
    }

    /// Append a block built from `fields` under a freshly allocated id.
    pub async fn add_block(
        &self,
        mut fields: Map<String, Value>,
    ) -> Result<ScrollDocument, ContentError> {
        fields.remove("indexPartId");

        let mut doc = self.get().await?;
        let index_part_id = self.counter.next_id().await?;
        doc.index_part_list.push(ContentBlock {
            index_part_id,
            fields,
        });
        self.replace(&doc).await?;

        tracing::debug!(index_part_id, "Added content block");
        Ok(doc)
    }

    /// Remove a block and its style images.
    pub async fn delete_block(&self, id: u64) -> Result<ScrollDocument, ContentError> {
        let mut doc = self.get().await?;
        let before = doc.index_part_list.len();
        doc.index_part_list.retain(|b| b.index_part_id != id);
        if doc.index_part_list.len() == before {
            return Err(ContentError::NotFound(id));
        }

        for style in STYLES {
            self.remove_style_images(id, style).await;
        }
        self.replace(&doc).await?;

        tracing::debug!(index_part_id = id, "Deleted content block");
        Ok(doc)
    }

    /// Store the image for one style of a block, replacing any previous one.
    /// Returns the stored file name.
    pub async fn store_style_image(
        &self,
        block_id: u64,
        style: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, ContentError> {
        if !STYLES.contains(&style) {
            return Err(ContentError::UnknownStyle(style.to_string()));
        }
        let ext = IMAGE_TYPES
            .iter()
            .find(|(mime, _)| *mime == content_type)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| ContentError::UnsupportedType(content_type.to_string()))?;

        let doc = self.get().await?;
        if !doc.index_part_list.iter().any(|b| b.index_part_id == block_id) {
            return Err(ContentError::NotFound(block_id));
        }

        self.remove_style_images(block_id, style).await;
        let key = style_image_key(block_id, style, ext);
        self.objects.put(&key, data).await?;

        tracing::debug!(key = %key, "Stored style image");
        Ok(style_image_name(block_id, style, ext))
    }

    async fn remove_style_images(&self, block_id: u64, style: &str) {
        for (_, ext) in IMAGE_TYPES {
            let key = style_image_key(block_id, style, ext);
            if let Err(e) = self.objects.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete style image");
            }
        }
    }
}
