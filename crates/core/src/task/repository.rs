//! Task repository trait
//!
//! Defines the interface for task storage operations.

use async_trait::async_trait;

use super::filter::TaskFilter;
use super::model::Task;
use crate::Result;

/// Repository interface for task CRUD operations
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Get a task by ID
    async fn find_by_id(&self, id: &str) -> Result<Task>;

    /// Get all tasks, or those matching `filter`
    async fn find_all(&self, filter: Option<&TaskFilter>) -> Result<Vec<Task>>;

    /// Create or replace a task, keyed by its id
    async fn save(&self, task: Task) -> Result<Task>;

    /// Delete a task by ID
    async fn delete(&self, id: &str) -> Result<()>;

    /// Number of tasks, or of those matching `filter`
    async fn count(&self, filter: Option<&TaskFilter>) -> Result<usize>;
}
