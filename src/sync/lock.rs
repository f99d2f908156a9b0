//! Single-flight guard for sync cycles
//!
//! At most one cycle runs per process. A second caller does not queue
//! behind the first; it sees the lock held and backs off.

use std::sync::{Arc, OnceLock};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Held for the duration of a cycle; dropping it releases the lock
#[derive(Debug)]
pub struct SyncGuard {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone)]
pub struct SyncLock {
    permits: Arc<Semaphore>,
}

impl SyncLock {
    /// A lock private to its holders, mainly for tests
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// The lock shared by every orchestrator in this process
    pub fn process() -> Self {
        static PROCESS_LOCK: OnceLock<SyncLock> = OnceLock::new();
        PROCESS_LOCK.get_or_init(SyncLock::new).clone()
    }

    /// Take the lock without waiting
    pub fn try_acquire(&self) -> Option<SyncGuard> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| SyncGuard { _permit: permit })
    }

    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for SyncLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let lock = SyncLock::new();
        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_held());
        assert!(lock.clone().try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_process_lock_is_shared() {
        let a = SyncLock::process();
        let b = SyncLock::process();
        let guard = a.try_acquire().unwrap();
        assert!(b.is_held());
        drop(guard);
    }
}
