//! In-memory storage adapter
//!
//! Mirrors the behaviour of [`FsStorage`](super::FsStorage) closely enough for
//! repository tests: same path policy, same error kinds, directories tracked
//! explicitly. Every instance owns its files and locks.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

use super::error::{StorageError, StorageResult};
use super::lock::LockManager;
use super::path::{file_name, glob_match, PathPolicy};
use super::{ByteStream, StorageAdapter};

const STREAM_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Bytes>,
    directories: BTreeSet<PathBuf>,
    fail_next_rename: bool,
}

impl MemoryState {
    fn is_dir(&self, path: &Path) -> bool {
        self.directories.contains(path)
    }

    /// Register `dir` and all of its ancestors as directories
    fn ensure_dirs(&mut self, dir: &Path) -> StorageResult<()> {
        let missing: Vec<&Path> = dir
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();

        if let Some(file) = missing.iter().find(|p| self.files.contains_key(**p)) {
            return Err(StorageError::invalid_path(
                "Directory path points to a file",
                file,
            ));
        }

        for ancestor in missing {
            self.directories.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.is_dir(parent),
            _ => true,
        }
    }

    fn store(&mut self, path: &Path, content: Bytes) -> StorageResult<()> {
        if self.is_dir(path) {
            return Err(StorageError::io("Path is a directory", path, None));
        }
        if let Some(parent) = path.parent() {
            self.ensure_dirs(parent)?;
        }
        self.files.insert(path.to_path_buf(), content);
        Ok(())
    }
}

/// Adapter keeping files and directories in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
    policy: PathPolicy,
    locks: LockManager,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an adapter pre-populated with `files`
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> StorageResult<Self>
    where
        P: Into<PathBuf>,
        C: Into<String>,
    {
        let storage = Self::new();
        {
            let mut state = storage.state();
            for (path, content) in files {
                let path = path.into();
                storage.policy.validate(&path)?;
                state.store(&path, Bytes::from(content.into()))?;
            }
        }
        Ok(storage)
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Make the next `rename` fail with an I/O error
    pub fn fail_next_rename(&self) {
        self.state().fail_next_rename = true;
    }

    /// Paths of all stored files, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state().files.keys().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    fn path_policy(&self) -> &PathPolicy {
        &self.policy
    }

    fn locks(&self) -> &LockManager {
        &self.locks
    }

    async fn read_file(&self, path: &Path) -> StorageResult<String> {
        self.policy.validate(path)?;
        let content = self
            .state()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_found("File not found", path))?;

        String::from_utf8(content.to_vec()).map_err(|e| {
            StorageError::io("File is not valid UTF-8", path, Some(Box::new(e)))
        })
    }

    async fn write_file(&self, path: &Path, content: &str) -> StorageResult<()> {
        self.policy.validate(path)?;
        self.state().store(path, Bytes::copy_from_slice(content.as_bytes()))
    }

    async fn delete_file(&self, path: &Path) -> StorageResult<()> {
        self.policy.validate(path)?;
        self.state()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("File not found", path))
    }

    async fn file_exists(&self, path: &Path) -> StorageResult<bool> {
        self.policy.validate(path)?;
        let state = self.state();
        Ok(state.files.contains_key(path) || state.is_dir(path))
    }

    async fn create_directory(&self, path: &Path) -> StorageResult<()> {
        self.policy.validate(path)?;
        let mut state = self.state();

        if state.files.contains_key(path) {
            return Err(StorageError::already_exists("Path already exists as a file", path));
        }
        if state.is_dir(path) {
            return Err(StorageError::already_exists("Directory already exists", path));
        }
        if !state.parent_exists(path) {
            return Err(StorageError::not_found("Parent directory not found", path));
        }

        state.directories.insert(path.to_path_buf());
        Ok(())
    }

    async fn ensure_directory(&self, path: &Path) -> StorageResult<()> {
        self.policy.validate(path)?;
        self.state().ensure_dirs(path)
    }

    async fn list_files(
        &self,
        directory: &Path,
        pattern: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        self.policy.validate(directory)?;
        let state = self.state();

        if !state.is_dir(directory) {
            return Err(StorageError::not_found("Directory not found", directory));
        }

        let names: BTreeSet<String> = state
            .files
            .keys()
            .chain(state.directories.iter())
            .filter(|p| p.parent() == Some(directory))
            .filter_map(|p| file_name(p))
            .filter(|name| pattern.map_or(true, |p| glob_match(p, name)))
            .collect();

        Ok(names.into_iter().collect())
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        self.policy.validate(from)?;
        self.policy.validate(to)?;
        let mut state = self.state();

        if std::mem::take(&mut state.fail_next_rename) {
            return Err(StorageError::io("Injected rename failure", to, None));
        }
        if !state.files.contains_key(from) {
            return Err(StorageError::not_found("File not found", from));
        }
        if state.is_dir(to) {
            return Err(StorageError::io("Destination is a directory", to, None));
        }
        if !state.parent_exists(to) {
            return Err(StorageError::not_found("Parent directory not found", to));
        }

        if let Some(content) = state.files.remove(from) {
            state.files.insert(to.to_path_buf(), content);
        }
        Ok(())
    }

    async fn read_file_stream(&self, path: &Path) -> StorageResult<ByteStream> {
        self.policy.validate(path)?;
        let content = self
            .state()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_found("File not found", path))?;

        let chunks: Vec<std::io::Result<Bytes>> = (0..content.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(|start| {
                let end = (start + STREAM_CHUNK_SIZE).min(content.len());
                Ok(content.slice(start..end))
            })
            .collect();

        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn write_file_stream(&self, path: &Path, mut stream: ByteStream) -> StorageResult<()> {
        self.policy.validate(path)?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::io("Failed to read from input stream", path, Some(Box::new(e)))
            })?;
            buffer.extend_from_slice(&chunk);
        }

        self.state().store(path, buffer.freeze())
    }
}
