//! Exclusive lock capability.
//!
//! A lock is keyed by the path of the file it protects and released when
//! its guard is dropped, so every exit path of the critical section unlocks.

mod file_lock;

pub use file_lock::{FileLock, FileLockProvider};

use std::path::Path;

use crate::config::LockPolicy;
use crate::error::Result;

/// Hands out exclusive locks keyed by a path.
pub trait LockProvider: Send + Sync {
    /// Held lock; dropping it releases the lock.
    type Guard;

    /// Acquire the lock for `key`, waiting no longer than `policy` allows.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::LockUnavailable`](crate::PersistenceError::LockUnavailable)
    /// when the lock is still held elsewhere after the policy's timeout.
    fn acquire(&self, key: &Path, policy: &LockPolicy) -> Result<Self::Guard>;
}
