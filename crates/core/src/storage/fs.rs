//! Storage adapter backed by the real file system

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::lock::LockManager;
use super::path::{file_name, glob_match, PathPolicy};
use super::{ByteStream, StorageAdapter};

/// `tokio::fs` based adapter
#[derive(Debug, Clone, Default)]
pub struct FsStorage {
    policy: PathPolicy,
    locks: LockManager,
}

impl FsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom path policy
    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(e, parent))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for FsStorage {
    fn path_policy(&self) -> &PathPolicy {
        &self.policy
    }

    fn locks(&self) -> &LockManager {
        &self.locks
    }

    async fn read_file(&self, path: &Path) -> StorageResult<String> {
        self.policy.validate(path)?;
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::from_io(e, path))
    }

    async fn write_file(&self, path: &Path, content: &str) -> StorageResult<()> {
        self.policy.validate(path)?;
        self.ensure_parent(path).await?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| StorageError::from_io(e, path))?;

        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> StorageResult<()> {
        self.policy.validate(path)?;
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| StorageError::from_io(e, path))?;

        debug!("Deleted {}", path.display());
        Ok(())
    }

    async fn file_exists(&self, path: &Path) -> StorageResult<bool> {
        self.policy.validate(path)?;
        Ok(tokio::fs::try_exists(path).await.unwrap_or(false))
    }

    async fn create_directory(&self, path: &Path) -> StorageResult<()> {
        self.policy.validate(path)?;
        tokio::fs::create_dir(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                StorageError::already_exists("Directory already exists", path)
            }
            _ => StorageError::from_io(e, path),
        })
    }

    async fn ensure_directory(&self, path: &Path) -> StorageResult<()> {
        self.policy.validate(path)?;
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::from_io(e, path))
    }

    async fn list_files(
        &self,
        directory: &Path,
        pattern: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        self.policy.validate(directory)?;

        let mut entries = tokio::fs::read_dir(directory)
            .await
            .map_err(|e| StorageError::from_io(e, directory))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(e, directory))?
        {
            let Some(name) = file_name(&entry.path()) else {
                continue;
            };
            if pattern.map_or(true, |p| glob_match(p, &name)) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        self.policy.validate(from)?;
        self.policy.validate(to)?;
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| StorageError::from_io(e, to))
    }

    async fn read_file_stream(&self, path: &Path) -> StorageResult<ByteStream> {
        self.policy.validate(path)?;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| StorageError::from_io(e, path))?;

        Ok(ReaderStream::new(file).boxed())
    }

    async fn write_file_stream(&self, path: &Path, mut stream: ByteStream) -> StorageResult<()> {
        self.policy.validate(path)?;
        self.ensure_parent(path).await?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| StorageError::from_io(e, path))?;

        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::io("Failed to read from input stream", path, Some(Box::new(e)))
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| StorageError::from_io(e, path))?;
            written += chunk.len();
        }
        file.flush()
            .await
            .map_err(|e| StorageError::from_io(e, path))?;

        debug!("Streamed {} bytes to {}", written, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn setup() -> (FsStorage, TempDir) {
        (FsStorage::new(), TempDir::new().unwrap())
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_reads_back() {
        let (storage, temp) = setup();
        let path = temp.path().join("nested/deeper/task.json");

        storage.write_file(&path, "{}").await.unwrap();
        assert_eq!(storage.read_file(&path).await.unwrap(), "{}");

        storage.write_file(&path, "[]").await.unwrap();
        assert_eq!(storage.read_file(&path).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let (storage, temp) = setup();
        let err = storage
            .read_file(&temp.path().join("missing.json"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_read_empty_path() {
        let (storage, _temp) = setup();
        let err = storage.read_file(Path::new("")).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_PATH");
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (storage, temp) = setup();
        let path = temp.path().join("a.txt");
        storage.write_file(&path, "a").await.unwrap();

        storage.delete_file(&path).await.unwrap();
        assert!(!storage.file_exists(&path).await.unwrap());

        let err = storage.delete_file(&path).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_create_directory_twice() {
        let (storage, temp) = setup();
        let dir = temp.path().join("data");

        storage.create_directory(&dir).await.unwrap();
        let err = storage.create_directory(&dir).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_EXISTS");

        let file = temp.path().join("plain.txt");
        storage.write_file(&file, "x").await.unwrap();
        let err = storage.create_directory(&file).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_ensure_directory_is_idempotent() {
        let (storage, temp) = setup();
        let dir = temp.path().join("a/b/c");

        storage.ensure_directory(&dir).await.unwrap();
        storage.ensure_directory(&dir).await.unwrap();
        assert!(storage.file_exists(&dir).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_files_with_pattern() {
        let (storage, temp) = setup();
        for name in ["b.txt", "a.txt", "c.json"] {
            storage
                .write_file(&temp.path().join(name), name)
                .await
                .unwrap();
        }

        let txt = storage.list_files(temp.path(), Some("*.txt")).await.unwrap();
        assert_eq!(txt, vec!["a.txt", "b.txt"]);

        let all = storage.list_files(temp.path(), None).await.unwrap();
        assert_eq!(all, vec!["a.txt", "b.txt", "c.json"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let (storage, temp) = setup();
        let err = storage
            .list_files(&temp.path().join("nope"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_restricted_prefix_denied() {
        let (_, temp) = setup();
        let storage = FsStorage::new()
            .with_policy(PathPolicy::permissive().with_restricted_prefix(temp.path()));

        let err = storage
            .write_file(&temp.path().join("x.json"), "{}")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let (storage, temp) = setup();
        let path = temp.path().join("big/blob.bin");

        let chunks: Vec<std::io::Result<Bytes>> = (0..64)
            .map(|i| Ok(Bytes::from(vec![i as u8; 4096])))
            .collect();
        storage
            .write_file_stream(&path, futures::stream::iter(chunks).boxed())
            .await
            .unwrap();

        let mut stream = storage.read_file_stream(&path).await.unwrap();
        let mut total = Vec::new();
        while let Some(chunk) = stream.next().await {
            total.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(total.len(), 64 * 4096);
        assert_eq!(total[4096], 1);
        assert_eq!(total[total.len() - 1], 63);
    }

    #[tokio::test]
    async fn test_read_stream_missing_file() {
        let (storage, temp) = setup();
        let result = storage.read_file_stream(&temp.path().join("missing")).await;
        assert_eq!(result.err().map(|e| e.code()), Some("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_locks_through_adapter() {
        let (storage, _temp) = setup();
        storage.acquire_lock("task-1").await.unwrap();
        let err = storage.acquire_lock("task-1").await.unwrap_err();
        assert_eq!(err.code(), "LOCK_ERROR");
        storage.release_lock("task-1").await.unwrap();
        storage.acquire_lock("task-1").await.unwrap();
    }
}
