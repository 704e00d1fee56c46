//! Advisory single-writer lock backed by the presence of a marker file.
//!
//! The marker is created with exclusive-create semantics, so concurrent
//! requests (and other processes sharing the directory) cannot both hold it.
//! There is no owner token and no expiry: a marker leaked by a crashed
//! process blocks uploads until it is removed by hand.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;

const MARKER: &[u8] = b"locked";

/// How many times to try for the lock and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Create the marker if it does not exist. Returns whether this call created
    /// it; failures other than an existing marker are returned as errors.
    pub async fn try_acquire(&self) -> io::Result<bool> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await;

        match file {
            Ok(mut file) => {
                if let Err(e) = file.write_all(MARKER).await {
                    // The marker exists, which is all that matters.
                    tracing::debug!(path = %self.path.display(), error = %e, "Failed to write lock marker body");
                }
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to create lock marker");
                Err(e)
            }
        }
    }

    /// Call [`try_acquire`](Self::try_acquire) up to `max_attempts` times, sleeping
    /// `interval` between attempts.
    pub async fn acquire_with_retry(
        &self,
        max_attempts: u32,
        interval: Duration,
    ) -> io::Result<bool> {
        for attempt in 1..=max_attempts {
            if self.try_acquire().await? {
                return Ok(true);
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(false)
    }

    /// Acquire with `policy` and hand back a guard that releases on drop.
    /// `Ok(None)` means the marker stayed held for the whole retry budget.
    pub async fn lock(&self, policy: RetryPolicy) -> io::Result<Option<LockGuard>> {
        let acquired = self
            .acquire_with_retry(policy.max_attempts, policy.interval)
            .await?;
        Ok(acquired.then(|| LockGuard {
            path: self.path.clone(),
            released: false,
        }))
    }

    /// Remove the marker. Failures are logged and swallowed.
    pub async fn release(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to release lock");
        }
    }
}

/// A held [`LockFile`]. Dropping the guard without calling
/// [`release`](Self::release) removes the marker synchronously.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub async fn release(mut self) {
        self.released = true;
        LockFile::new(&self.path).release().await;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to release lock on drop");
        }
    }
}
