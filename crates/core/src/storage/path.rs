//! Path validation and file-name pattern matching shared by the adapters

use std::path::{Component, Path, PathBuf};

use super::error::{StorageError, StorageResult};

/// Characters rejected inside any path component
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Rules applied to every path handed to a storage adapter
#[derive(Debug, Clone)]
pub struct PathPolicy {
    restricted_prefixes: Vec<PathBuf>,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            restricted_prefixes: vec![
                PathBuf::from("/proc"),
                PathBuf::from("/sys"),
                PathBuf::from("/dev"),
            ],
        }
    }
}

impl PathPolicy {
    /// A policy that only rejects empty paths and invalid characters
    pub fn permissive() -> Self {
        Self {
            restricted_prefixes: Vec::new(),
        }
    }

    /// Add a prefix under which every access is refused
    pub fn with_restricted_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.restricted_prefixes.push(prefix.into());
        self
    }

    pub fn validate(&self, path: &Path) -> StorageResult<()> {
        if path.as_os_str().is_empty() {
            return Err(StorageError::invalid_path("Empty path is invalid", path));
        }

        // Only normal components are checked so drive prefixes like `C:` stay legal
        let has_invalid_char = path.components().any(|component| match component {
            Component::Normal(part) => part.to_string_lossy().contains(INVALID_CHARS),
            _ => false,
        });
        if has_invalid_char {
            return Err(StorageError::invalid_path(
                "Path contains invalid characters",
                path,
            ));
        }

        if self
            .restricted_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix))
        {
            return Err(StorageError::permission_denied("Insufficient permissions", path));
        }

        Ok(())
    }
}

/// Match a file name against a glob where `*` matches any run of characters
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, n));
            p += 1;
        } else if p < pattern.len() && pattern[p] == name[n] {
            p += 1;
            n += 1;
        } else if let Some((star, matched)) = backtrack {
            // Let the last star swallow one more character
            p = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Base name of `path` as an owned string, if it has one
pub(crate) fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_is_invalid() {
        let err = PathPolicy::default().validate(Path::new("")).unwrap_err();
        assert_eq!(err.code(), "INVALID_PATH");
    }

    #[test]
    fn test_invalid_characters() {
        let policy = PathPolicy::default();
        for bad in ["data/a?.json", "data/<x>", "a|b", "tasks/*.json", "x\"y"] {
            let err = policy.validate(Path::new(bad)).unwrap_err();
            assert_eq!(err.code(), "INVALID_PATH", "{bad}");
        }
        assert!(policy.validate(Path::new("data/task-1.json")).is_ok());
    }

    #[test]
    fn test_restricted_prefix() {
        let policy = PathPolicy::permissive().with_restricted_prefix("/secure");
        let err = policy.validate(Path::new("/secure/tasks.json")).unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");

        // Prefix match is per component, not per character
        assert!(policy.validate(Path::new("/secured/tasks.json")).is_ok());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.txt", "a.txt"));
        assert!(!glob_match("*.txt", "c.json"));
        assert!(glob_match("*", ""));
        assert!(glob_match("task-*.json", "task-42.json"));
        assert!(!glob_match("task-*.json", "task-42.json.tmp"));
        assert!(glob_match("*a*b*", "xxaxxbxx"));
        assert!(!glob_match("*a*b", "xxbxxa"));
        assert!(glob_match("exact.json", "exact.json"));
        assert!(!glob_match("exact.json", "exact.jsonx"));
    }
}
