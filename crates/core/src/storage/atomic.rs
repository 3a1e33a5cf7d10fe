//! Crash-safe file replacement
//!
//! Content is written in full to `<path>.tmp`, then renamed over `<path>`.
//! The destination keeps its previous content (or absence) until the rename lands.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::StorageResult;
use super::{StorageAdapter, StorageError};

/// Sibling temp path used while replacing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    PathBuf::from(temp)
}

/// Atomically replace `path` with `content` using the primitives of `storage`
pub async fn write_atomic<S>(storage: &S, path: &Path, content: &str) -> StorageResult<()>
where
    S: StorageAdapter + ?Sized,
{
    storage.path_policy().validate(path)?;

    let temp_path = temp_path_for(path);
    storage.write_file(&temp_path, content).await?;

    match storage.rename(&temp_path, path).await {
        Ok(()) => {
            debug!("Atomically wrote {} bytes to {}", content.len(), path.display());
            Ok(())
        }
        Err(rename_error) => {
            if let Err(e) = storage.delete_file(&temp_path).await {
                warn!("Failed to clean up temp file {}: {}", temp_path.display(), e);
            }
            Err(StorageError::atomic_failed(
                "Atomic file write failed",
                path,
                Box::new(rename_error),
            ))
        }
    }
}
