//! Error types for storage adapters

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Boxed underlying cause carried by some storage errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while touching the file system (or its in-memory stand-in)
#[derive(Debug, Error)]
pub enum StorageError {
    /// File or directory does not exist
    #[error("{message}: {}", path.display())]
    NotFound { message: String, path: PathBuf },

    /// Access to the path was refused
    #[error("{message}: {}", path.display())]
    PermissionDenied { message: String, path: PathBuf },

    /// A file or directory already occupies the path
    #[error("{message}: {}", path.display())]
    AlreadyExists { message: String, path: PathBuf },

    /// Any other I/O failure
    #[error("{message}: {}", path.display())]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<BoxError>,
    },

    /// Lock acquisition or release failed
    #[error("{message}: {resource_id}")]
    Lock {
        message: String,
        resource_id: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The path is rejected by the path policy
    #[error("{message}: {}", path.display())]
    InvalidPath { message: String, path: PathBuf },

    /// Temp-file + rename replacement failed
    #[error("{message}: {}", path.display())]
    AtomicOperationFailed {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    pub fn not_found(message: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            message: message.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn permission_denied(message: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn already_exists(message: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn invalid_path(message: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::InvalidPath {
            message: message.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an Io error with an optional source
    pub fn io(
        message: impl Into<String>,
        path: impl AsRef<Path>,
        source: Option<BoxError>,
    ) -> Self {
        Self::Io {
            message: message.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn lock(message: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
            resource_id: resource_id.into(),
            source: None,
        }
    }

    pub fn atomic_failed(
        message: impl Into<String>,
        path: impl AsRef<Path>,
        source: BoxError,
    ) -> Self {
        Self::AtomicOperationFailed {
            message: message.into(),
            path: path.as_ref().to_path_buf(),
            source: Some(source),
        }
    }

    /// Map a `std::io::Error` raised for `path` onto the taxonomy
    pub fn from_io(error: io::Error, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match error.kind() {
            io::ErrorKind::NotFound => Self::not_found("File or directory not found", path),
            io::ErrorKind::PermissionDenied => {
                Self::permission_denied("Access to file or directory denied", path)
            }
            io::ErrorKind::AlreadyExists => {
                Self::already_exists("File or directory already exists", path)
            }
            _ => Self::io(format!("I/O error: {}", error), path, Some(Box::new(error))),
        }
    }

    /// Machine-readable tag for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Io { .. } => "IO_ERROR",
            Self::Lock { .. } => "LOCK_ERROR",
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::AtomicOperationFailed { .. } => "ATOMIC_OPERATION_FAILED",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message, .. }
            | Self::PermissionDenied { message, .. }
            | Self::AlreadyExists { message, .. }
            | Self::Io { message, .. }
            | Self::Lock { message, .. }
            | Self::InvalidPath { message, .. }
            | Self::AtomicOperationFailed { message, .. } => message,
        }
    }

    /// The offending path, or `None` for lock errors which carry a resource id instead
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound { path, .. }
            | Self::PermissionDenied { path, .. }
            | Self::AlreadyExists { path, .. }
            | Self::Io { path, .. }
            | Self::InvalidPath { path, .. }
            | Self::AtomicOperationFailed { path, .. } => Some(path),
            Self::Lock { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_kinds() {
        let err = StorageError::from_io(io::Error::from(io::ErrorKind::NotFound), "a.json");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.path(), Some(Path::new("a.json")));

        let err = StorageError::from_io(io::Error::from(io::ErrorKind::PermissionDenied), "a");
        assert_eq!(err.code(), "PERMISSION_DENIED");

        let err = StorageError::from_io(io::Error::from(io::ErrorKind::AlreadyExists), "a");
        assert_eq!(err.code(), "ALREADY_EXISTS");

        let err = StorageError::from_io(io::Error::other("disk on fire"), "a");
        assert_eq!(err.code(), "IO_ERROR");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_lock_error_has_no_path() {
        let err = StorageError::lock("Resource is already locked", "task-1");
        assert_eq!(err.code(), "LOCK_ERROR");
        assert!(err.path().is_none());
        assert_eq!(err.to_string(), "Resource is already locked: task-1");
    }
}
