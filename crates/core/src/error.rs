//! Error types surfaced at the task repository boundary

use thiserror::Error;

use crate::storage::StorageError;
use crate::task::{describe_field_errors, FieldErrors, SerializationError, UpdateError};

/// Underlying cause of [`Error::Storage`]
#[derive(Error, Debug)]
pub enum StorageFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Task not found: {message}")]
    NotFound { message: String },

    #[error("Task already exists: {message}")]
    AlreadyExists { message: String },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<StorageFailure>,
    },

    #[error("Validation error: {message}")]
    Validation { message: String, errors: FieldErrors },

    #[error("Concurrency error: {message}")]
    Concurrency { message: String },
}

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation {
            message: describe_field_errors(&errors),
            errors,
        }
    }

    /// Machine-readable tag for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Concurrency { .. } => "CONCURRENCY_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::AlreadyExists { message }
            | Self::Storage { message, .. }
            | Self::Validation { message, .. }
            | Self::Concurrency { message } => message,
        }
    }

    /// The storage error behind a `Storage` error, if that is its cause
    pub fn storage_cause(&self) -> Option<&StorageError> {
        match self {
            Self::Storage {
                source: Some(StorageFailure::Storage(e)),
                ..
            } => Some(e),
            _ => None,
        }
    }

    /// The serialization error behind a `Storage` error, if that is its cause
    pub fn serialization_cause(&self) -> Option<&SerializationError> {
        match self {
            Self::Storage {
                source: Some(StorageFailure::Serialization(e)),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for Error {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound { path, .. } => Self::NotFound {
                message: path.display().to_string(),
            },
            StorageError::AlreadyExists { path, .. } => Self::AlreadyExists {
                message: path.display().to_string(),
            },
            other => Self::Storage {
                message: other.to_string(),
                source: Some(StorageFailure::Storage(other)),
            },
        }
    }
}

impl From<SerializationError> for Error {
    fn from(error: SerializationError) -> Self {
        Self::Storage {
            message: error.to_string(),
            source: Some(StorageFailure::Serialization(error)),
        }
    }
}

impl From<UpdateError> for Error {
    fn from(error: UpdateError) -> Self {
        Self::Validation {
            message: error.to_string(),
            errors: error.field_errors(),
        }
    }
}
