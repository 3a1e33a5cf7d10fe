//! Storage module
//!
//! Every file-system access in this crate goes through a [`StorageAdapter`].
//! Two adapters are provided: [`FsStorage`] on top of `tokio::fs`, and
//! [`MemoryStorage`] which keeps everything in memory for tests.

mod atomic;
mod error;
mod fs;
mod lock;
mod memory;
mod path;

use std::future::Future;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use atomic::{temp_path_for, write_atomic};
pub use error::{BoxError, StorageError, StorageResult};
pub use fs::FsStorage;
pub use lock::{LockGuard, LockManager};
pub use memory::MemoryStorage;
pub use path::{glob_match, PathPolicy};

/// Chunked file contents
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Primitive file-system operations behind a uniform error taxonomy
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Rules applied to every path argument
    fn path_policy(&self) -> &PathPolicy;

    /// Advisory locks owned by this adapter
    fn locks(&self) -> &LockManager;

    /// Read a whole file as UTF-8
    async fn read_file(&self, path: &Path) -> StorageResult<String>;

    /// Write a file, creating parent directories. Not atomic.
    async fn write_file(&self, path: &Path, content: &str) -> StorageResult<()>;

    async fn delete_file(&self, path: &Path) -> StorageResult<()>;

    /// Whether something exists at `path`. Only fails on an invalid path.
    async fn file_exists(&self, path: &Path) -> StorageResult<bool>;

    /// Create a single directory, failing if anything already occupies `path`
    async fn create_directory(&self, path: &Path) -> StorageResult<()>;

    /// Create `path` and its ancestors if missing
    async fn ensure_directory(&self, path: &Path) -> StorageResult<()>;

    /// Sorted base names of the entries in `directory`, optionally filtered by a
    /// `*` glob applied to the base name
    async fn list_files(
        &self,
        directory: &Path,
        pattern: Option<&str>,
    ) -> StorageResult<Vec<String>>;

    /// Move `from` over `to`
    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    async fn read_file_stream(&self, path: &Path) -> StorageResult<ByteStream>;

    /// Write `stream` to `path` chunk by chunk, creating parent directories
    async fn write_file_stream(&self, path: &Path, stream: ByteStream) -> StorageResult<()>;

    async fn acquire_lock(&self, resource_id: &str) -> StorageResult<()> {
        self.locks().acquire(resource_id)
    }

    async fn release_lock(&self, resource_id: &str) -> StorageResult<()> {
        self.locks().release(resource_id)
    }

    /// Replace `path` through a sibling temp file and a rename
    async fn atomic_write_file(&self, path: &Path, content: &str) -> StorageResult<()> {
        write_atomic(self, path, content).await
    }

    /// Run `operation` while holding the advisory lock on `resource_id`
    ///
    /// See [`LockManager::with_lock`].
    async fn with_lock<T, E, F, Fut>(&self, resource_id: &str, operation: F) -> Result<T, E>
    where
        T: Send,
        E: From<StorageError> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.locks().with_lock(resource_id, operation).await
    }
}
