pub mod ids;
pub mod lock;
pub mod log;
pub mod models;

pub use ids::{AllocationError, IdAllocator};
pub use lock::{LockFile, LockGuard, RetryPolicy};
pub use log::{JsonFileLog, LogStore};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Record {index} in {path} is not a valid file record: {source}")]
    InvalidRecord {
        path: PathBuf,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Sibling temp path unique to this process and call.
fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

/// Replace `path` with `contents` by writing a temp file and renaming it over.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Pretty-print `value` (2-space indent) and write it atomically.
pub(crate) async fn write_json<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &data).await?;
    Ok(())
}

/// Strip a leading byte-order mark and surrounding whitespace.
pub(crate) fn clean_json_text(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('\u{feff}').unwrap_or(trimmed).trim()
}
