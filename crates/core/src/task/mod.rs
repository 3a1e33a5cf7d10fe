//! Task module
//!
//! Task model, JSON serialization, filtering and the repositories that
//! persist tasks through a [`StorageAdapter`](crate::storage::StorageAdapter).

mod array_store;
mod file_repository;
mod filter;
mod model;
mod repository;
mod serialization;

pub use array_store::ArrayFileTaskStore;
pub use file_repository::FileTaskRepository;
pub use filter::{apply_filter, TaskFilter};
pub use model::*;
pub use repository::TaskRepository;
pub use serialization::{
    deserialize_task, deserialize_tasks, from_serialized, serialize_task, serialize_tasks,
    to_serialized, SerializationError, SerializedTask,
};
