//! Single-file task storage
//!
//! Stores all tasks as one JSON array in a file, with an in-memory cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::filter::{apply_filter, TaskFilter};
use super::model::Task;
use super::repository::TaskRepository;
use super::serialization::{deserialize_tasks, serialize_tasks};
use crate::storage::StorageAdapter;
use crate::{Error, Result};

/// Task store keeping every task in one JSON array file
pub struct ArrayFileTaskStore<S> {
    storage: Arc<S>,
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory cache of tasks
    cache: RwLock<HashMap<String, Task>>,
}

impl<S: StorageAdapter> ArrayFileTaskStore<S> {
    /// Open the store, loading `path` if it exists
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn open(storage: Arc<S>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = if storage.file_exists(&path).await? {
            let content = storage.read_file(&path).await?;
            let tasks = deserialize_tasks(&content)?;
            debug!("Loaded {} tasks from {}", tasks.len(), path.display());
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            storage,
            path,
            cache: RwLock::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `tasks` to disk atomically
    async fn persist(&self, tasks: &HashMap<String, Task>) -> Result<()> {
        let content = serialize_tasks(&sorted(tasks.values().cloned().collect()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.storage.ensure_directory(parent).await?;
        }

        self.storage.atomic_write_file(&self.path, &content).await?;
        debug!("Persisted {} tasks to {}", tasks.len(), self.path.display());
        Ok(())
    }
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    tasks
}

#[async_trait]
impl<S: StorageAdapter> TaskRepository for ArrayFileTaskStore<S> {
    async fn find_by_id(&self, id: &str) -> Result<Task> {
        let cache = self.cache.read().await;
        cache.get(id).cloned().ok_or_else(|| Error::not_found(id))
    }

    async fn find_all(&self, filter: Option<&TaskFilter>) -> Result<Vec<Task>> {
        let cache = self.cache.read().await;
        let tasks = sorted(cache.values().cloned().collect());
        Ok(apply_filter(tasks, filter))
    }

    async fn save(&self, task: Task) -> Result<Task> {
        task.validate().map_err(Error::validation)?;

        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        next.insert(task.id.clone(), task.clone());

        // The cache only changes once the file has been replaced
        self.persist(&next).await?;
        *cache = next;
        Ok(task)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        if !cache.contains_key(id) {
            return Err(Error::not_found(id));
        }

        let mut next = cache.clone();
        next.remove(id);
        self.persist(&next).await?;
        *cache = next;
        Ok(())
    }

    async fn count(&self, filter: Option<&TaskFilter>) -> Result<usize> {
        match filter {
            Some(filter) => {
                let cache = self.cache.read().await;
                Ok(cache.values().filter(|t| filter.matches(t)).count())
            }
            None => Ok(self.cache.read().await.len()),
        }
    }
}
