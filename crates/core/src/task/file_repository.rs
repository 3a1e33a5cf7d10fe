//! One-file-per-task repository
//!
//! Each task lives in `<data_dir>/<id><ext>` as a single JSON object. Files are
//! replaced atomically on save. Listing reads every task file concurrently.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use super::filter::{apply_filter, TaskFilter};
use super::model::{Task, TaskUpdate};
use super::repository::TaskRepository;
use super::serialization::{deserialize_task, serialize_task};
use crate::config::RepositoryConfig;
use crate::error::StorageFailure;
use crate::storage::{StorageAdapter, StorageError, StorageResult};
use crate::{Error, Result};

/// Task repository storing one JSON file per task
pub struct FileTaskRepository<S> {
    storage: Arc<S>,
    config: RepositoryConfig,
}

impl<S: StorageAdapter + 'static> FileTaskRepository<S> {
    /// Create a repository and start creating the data directory in the background
    ///
    /// Directory creation is not awaited; `save` creates it again if needed and
    /// listing treats a missing directory as empty.
    pub fn new(storage: Arc<S>, config: RepositoryConfig) -> Self {
        let repository = Self { storage, config };
        repository.spawn_initialize();
        repository
    }

    /// Create a repository once the data directory exists
    pub async fn open(storage: Arc<S>, config: RepositoryConfig) -> Result<Self> {
        let repository = Self { storage, config };
        repository.initialize().await?;
        Ok(repository)
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn spawn_initialize(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, deferring data directory creation to first save");
            return;
        };

        let storage = Arc::clone(&self.storage);
        let data_dir = self.config.data_dir.clone();
        handle.spawn(async move {
            if let Err(e) = storage.ensure_directory(&data_dir).await {
                warn!("Failed to create data directory {}: {}", data_dir.display(), e);
            }
        });
    }

    async fn initialize(&self) -> Result<()> {
        self.storage
            .ensure_directory(&self.config.data_dir)
            .await
            .map_err(|e| match Error::from(e) {
                Error::Storage { message, source } => Error::Storage {
                    message: format!("Failed to create data directory: {}", message),
                    source,
                },
                other => other,
            })
    }

    /// Path of the file holding task `id`
    pub fn task_path(&self, id: &str) -> StorageResult<PathBuf> {
        let file_name = format!("{}{}", id, self.config.file_extension);
        let path = self.config.data_dir.join(&file_name);

        let escapes = id.contains(['/', '\\']) || id.contains("..") || id == ".";
        if id.is_empty() || escapes {
            return Err(StorageError::invalid_path(
                format!("Invalid task id: [{}]", id),
                path,
            ));
        }
        Ok(path)
    }

    /// Names of the task files in the data directory, excluding the index file
    async fn task_file_names(&self) -> Result<Vec<String>> {
        let pattern = self.config.task_file_pattern();
        match self
            .storage
            .list_files(&self.config.data_dir, Some(&pattern))
            .await
        {
            Ok(names) => Ok(names
                .into_iter()
                .filter(|name| *name != self.config.index_file_name)
                .collect()),
            Err(e) if e.is_not_found() => {
                debug!(
                    "Data directory {} does not exist yet",
                    self.config.data_dir.display()
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, path: PathBuf) -> Result<Task> {
        let content = self.storage.read_file(&path).await?;
        Ok(deserialize_task(&content)?)
    }

    /// Load an entry returned by the directory listing
    ///
    /// The entry was just listed, so failing to read it is a storage failure even
    /// when the adapter reports it as missing.
    async fn load_listed(&self, name: &str) -> Result<Task> {
        let path = self.config.data_dir.join(name);
        let content = self
            .storage
            .read_file(&path)
            .await
            .map_err(|e| Error::Storage {
                message: format!("Failed to read task file {}: {}", path.display(), e),
                source: Some(StorageFailure::Storage(e)),
            })?;
        Ok(deserialize_task(&content)?)
    }

    /// Read, modify and save a task while holding its lock
    ///
    /// Fails with [`Error::Concurrency`] if another caller holds the lock on `id`.
    pub async fn update(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        self.task_path(id)?;

        let result = self
            .storage
            .with_lock(id, move || async move {
                let current = self.find_by_id(id).await?;
                let next = current.apply(update, Utc::now())?;
                self.save(next).await
            })
            .await;

        result.map_err(|e| match e {
            Error::Storage {
                source: Some(StorageFailure::Storage(StorageError::Lock { .. })),
                ..
            } => Error::concurrency(format!("Task {} is locked by another operation", id)),
            other => other,
        })
    }
}

#[async_trait]
impl<S: StorageAdapter + 'static> TaskRepository for FileTaskRepository<S> {
    async fn find_by_id(&self, id: &str) -> Result<Task> {
        let path = self.task_path(id)?;
        self.load(path).await.map_err(|e| match e {
            Error::NotFound { .. } => Error::not_found(id),
            other => other,
        })
    }

    async fn find_all(&self, filter: Option<&TaskFilter>) -> Result<Vec<Task>> {
        let names = self.task_file_names().await?;
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let loads = names.iter().map(|name| self.load_listed(name));
        let results = join_all(loads).await;

        // First error in listing order, regardless of completion order
        let tasks = results.into_iter().collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} tasks from {}", tasks.len(), self.config.data_dir.display());

        Ok(apply_filter(tasks, filter))
    }

    async fn save(&self, task: Task) -> Result<Task> {
        self.initialize().await?;

        task.validate().map_err(Error::validation)?;
        let json = serialize_task(&task)?;
        let path = self.task_path(&task.id)?;

        self.storage.atomic_write_file(&path, &json).await?;

        debug!("Saved task {} to {}", task.id, path.display());
        Ok(task)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.task_path(id)?;

        if !self.storage.file_exists(&path).await? {
            return Err(Error::not_found(id));
        }

        self.storage.delete_file(&path).await?;
        debug!("Deleted task {}", id);
        Ok(())
    }

    async fn count(&self, filter: Option<&TaskFilter>) -> Result<usize> {
        match filter {
            Some(filter) => Ok(self.find_all(Some(filter)).await?.len()),
            None => Ok(self.task_file_names().await?.len()),
        }
    }
}
