//! Core library for Taskbox
//!
//! This crate contains the task storage layer, including:
//! - Storage adapters (file system and in-memory) with atomic writes and advisory locks
//! - Task model, serialization and filtering
//! - File-backed task repositories

pub mod config;
pub mod error;
pub mod storage;
pub mod task;

pub use config::RepositoryConfig;
pub use error::{Error, StorageFailure};
pub use storage::{FsStorage, MemoryStorage, StorageAdapter, StorageError};
pub use task::{FileTaskRepository, Task, TaskFilter, TaskRepository};

/// Error returned by task repositories
pub type RepositoryError = Error;
pub type Result<T> = std::result::Result<T, Error>;
