//! Repository configuration
//!
//! Defaults can be overridden from the environment (`TASKBOX_DATA_DIR`,
//! `TASKBOX_FILE_EXTENSION`) or from a JSON config file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_FILE_EXTENSION: &str = ".json";
const DEFAULT_INDEX_FILE_NAME: &str = "index.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Where and how task files are stored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryConfig {
    #[serde(rename = "dataDirectory")]
    pub data_dir: PathBuf,
    /// Extension of task files, including the leading dot
    pub file_extension: String,
    /// Reserved file name skipped when enumerating tasks
    pub index_file_name: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            index_file_name: DEFAULT_INDEX_FILE_NAME.to_string(),
        }
    }
}

/// Trimmed value, or `None` when unset or blank
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl RepositoryConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::default().with_data_dir(data_dir)
    }

    /// Defaults overridden by `TASKBOX_DATA_DIR` and `TASKBOX_FILE_EXTENSION`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::with_overrides(
            std::env::var("TASKBOX_DATA_DIR").ok(),
            std::env::var("TASKBOX_FILE_EXTENSION").ok(),
        )
    }

    fn with_overrides(
        data_dir: Option<String>,
        file_extension: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(dir) = non_blank(data_dir) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(extension) = non_blank(file_extension) {
            config.file_extension = extension;
        }
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file; missing keys take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data directory must not be empty".to_string()));
        }
        if !self.file_extension.starts_with('.') || self.file_extension.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "file extension must look like '.json', got '{}'",
                self.file_extension
            )));
        }
        if self.index_file_name.is_empty() {
            return Err(ConfigError::Invalid("index file name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Glob matching task files in the data directory
    pub fn task_file_pattern(&self) -> String {
        format!("*{}", self.file_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.file_extension, ".json");
        assert_eq!(config.index_file_name, "index.json");
        assert_eq!(config.task_file_pattern(), "*.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"dataDirectory": "/var/tasks"}"#).unwrap();

        let config = RepositoryConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/tasks"));
        assert_eq!(config.file_extension, ".json");
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();

        let missing = RepositoryConfig::load(temp.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            RepositoryConfig::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));

        std::fs::write(&path, r#"{"fileExtension": "json"}"#).unwrap();
        assert!(matches!(
            RepositoryConfig::load(&path).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn test_overrides_fall_back_on_blank_values() {
        let config = RepositoryConfig::with_overrides(None, None).unwrap();
        assert_eq!(config, RepositoryConfig::default());

        let config =
            RepositoryConfig::with_overrides(Some("   ".to_string()), Some(String::new())).unwrap();
        assert_eq!(config, RepositoryConfig::default());

        let config = RepositoryConfig::with_overrides(
            Some(" /srv/tasks ".to_string()),
            Some(".task".to_string()),
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/tasks"));
        assert_eq!(config.file_extension, ".task");

        let err = RepositoryConfig::with_overrides(None, Some("txt".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_env_reads_variables() {
        std::env::set_var("TASKBOX_DATA_DIR", "/tmp/taskbox-env-test");
        std::env::remove_var("TASKBOX_FILE_EXTENSION");

        let config = RepositoryConfig::from_env().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/taskbox-env-test"));
        assert_eq!(config.file_extension, ".json");

        std::env::remove_var("TASKBOX_DATA_DIR");
    }

    #[test]
    fn test_builder() {
        let config = RepositoryConfig::new("tasks").with_file_extension(".task");
        assert_eq!(config.data_dir, PathBuf::from("tasks"));
        assert_eq!(config.task_file_pattern(), "*.task");
    }
}
