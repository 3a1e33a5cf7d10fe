//! Process-local advisory locks
//!
//! Locks are keyed by opaque resource ids and carry no ownership token: whoever
//! holds the id string can release it. Acquisition never waits.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};

/// Set of currently held resource ids
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked mid-update
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `resource_id` as locked, failing if it already is
    pub fn acquire(&self, resource_id: &str) -> StorageResult<()> {
        if resource_id.is_empty() {
            return Err(StorageError::lock("Resource id must not be empty", resource_id));
        }

        if !self.held().insert(resource_id.to_string()) {
            return Err(StorageError::lock("Resource is already locked", resource_id));
        }

        debug!("Acquired lock: {}", resource_id);
        Ok(())
    }

    /// Unlock `resource_id`, failing if it is not locked
    pub fn release(&self, resource_id: &str) -> StorageResult<()> {
        if !self.held().remove(resource_id) {
            return Err(StorageError::lock("Resource is not locked", resource_id));
        }

        debug!("Released lock: {}", resource_id);
        Ok(())
    }

    pub fn is_locked(&self, resource_id: &str) -> bool {
        self.held().contains(resource_id)
    }

    /// Ids currently held, sorted
    pub fn held_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.held().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Acquire `resource_id` and return a guard that releases it on drop
    pub fn guard(&self, resource_id: &str) -> StorageResult<LockGuard> {
        self.acquire(resource_id)?;
        Ok(LockGuard {
            locks: self.clone(),
            resource_id: resource_id.to_string(),
            released: false,
        })
    }

    /// Run `operation` while holding `resource_id`
    ///
    /// The lock is released on every exit path: success, error, panic, and the
    /// returned future being dropped early. A panic is reported as
    /// [`StorageError::Io`] with the panic message as source.
    pub async fn with_lock<T, E, F, Fut>(&self, resource_id: &str, operation: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.guard(resource_id)?;

        // `operation` itself may panic before returning a future
        let outcome = AssertUnwindSafe(async move { operation().await })
            .catch_unwind()
            .await;

        if let Err(e) = guard.release() {
            warn!("Failed to release lock after operation: {}", e);
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => Err(StorageError::io(
                "Operation inside lock failed",
                resource_id,
                Some(panic_message(panic).into()),
            )
            .into()),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_string()
    }
}

/// Releases its resource id when dropped
#[derive(Debug)]
pub struct LockGuard {
    locks: LockManager,
    resource_id: String,
    released: bool,
}

impl LockGuard {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Release now, reporting a failure instead of logging it
    pub fn release(mut self) -> StorageResult<()> {
        self.released = true;
        self.locks.release(&self.resource_id)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.locks.release(&self.resource_id) {
            warn!("Failed to release lock on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_twice_fails() {
        let locks = LockManager::new();
        locks.acquire("task-1").unwrap();

        let err = locks.acquire("task-1").unwrap_err();
        assert_eq!(err.code(), "LOCK_ERROR");
        assert!(locks.is_locked("task-1"));

        locks.release("task-1").unwrap();
        locks.acquire("task-1").unwrap();
    }

    #[test]
    fn test_release_unlocked_fails() {
        let locks = LockManager::new();
        let err = locks.release("never-held").unwrap_err();
        assert_eq!(err.code(), "LOCK_ERROR");
        assert!(!locks.is_locked("never-held"));
    }

    #[test]
    fn test_empty_resource_id_rejected() {
        let locks = LockManager::new();
        assert!(locks.acquire("").is_err());
        assert!(locks.held_ids().is_empty());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = LockManager::new();
        {
            let guard = locks.guard("a").unwrap();
            assert_eq!(guard.resource_id(), "a");
            assert_eq!(locks.held_ids(), vec!["a".to_string()]);
        }
        assert!(!locks.is_locked("a"));
    }

    #[tokio::test]
    async fn test_with_lock_returns_result_and_releases() {
        let locks = LockManager::new();
        let value: StorageResult<u32> = locks
            .with_lock("r", || async { Ok(7) })
            .await;
        assert_eq!(value.unwrap(), 7);
        assert!(!locks.is_locked("r"));
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_error_result() {
        let locks = LockManager::new();
        let result: StorageResult<()> = locks
            .with_lock("r", || async { Err(StorageError::not_found("gone", "x")) })
            .await;
        assert_eq!(result.unwrap_err().code(), "NOT_FOUND");
        assert!(!locks.is_locked("r"));
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_panic() {
        let locks = LockManager::new();
        let result: StorageResult<()> = locks
            .with_lock("r", || async {
                if true {
                    panic!("boom");
                }
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "boom");

        locks.acquire("r").unwrap();
    }

    #[tokio::test]
    async fn test_with_lock_releases_when_closure_panics() {
        let locks = LockManager::new();
        let result: StorageResult<()> = locks
            .with_lock("r", || -> std::future::Ready<StorageResult<()>> {
                panic!("closure boom")
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "closure boom");
        assert!(!locks.is_locked("r"));
    }

    #[tokio::test]
    async fn test_with_lock_fails_when_held() {
        let locks = LockManager::new();
        locks.acquire("r").unwrap();

        let result: StorageResult<()> = locks.with_lock("r", || async { Ok(()) }).await;
        assert_eq!(result.unwrap_err().code(), "LOCK_ERROR");
        // The original holder keeps the lock
        assert!(locks.is_locked("r"));
    }

    #[tokio::test]
    async fn test_with_lock_released_when_future_dropped() {
        let locks = LockManager::new();
        let pending = locks.with_lock("r", || async {
            futures::future::pending::<StorageResult<()>>().await
        });
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(!locks.is_locked("r"));
    }
}
