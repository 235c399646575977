//! Guard configuration.
//!
//! A guard is configured with the target file, an optional backup directory
//! and the lock policy. The configuration can be built in code or read from
//! a TOML file:
//!
//! ```toml
//! target = "satis.json"
//! backup_dir = "backups"
//!
//! [lock]
//! timeout_ms = 5000
//! poll_interval_ms = 50
//! ```
//!
//! Relative paths in a TOML file are resolved against the file's directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, Result};

/// Default time to wait for a contended lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Default delay between lock attempts.
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 50;

/// How long `flush` may wait for the exclusive lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPolicy {
    /// Total time to wait before giving up. `0` fails on first contention.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between attempts while the lock is held elsewhere.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_LOCK_POLL_INTERVAL_MS
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LockPolicy {
    /// A policy that gives up as soon as the lock is found to be held.
    #[must_use]
    pub fn fail_fast() -> Self {
        Self {
            timeout_ms: 0,
            ..Default::default()
        }
    }

    /// A policy waiting at most `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ..Default::default()
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval, never below one millisecond.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Configuration of a [`FilePersister`](crate::FilePersister).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// The canonical document file.
    pub target: PathBuf,

    /// Where timestamped snapshots go. Backups are skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    #[serde(default)]
    pub lock: LockPolicy,
}

impl GuardConfig {
    /// Create a configuration for `target` without backups.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            backup_dir: None,
            lock: LockPolicy::default(),
        }
    }

    /// Set the backup directory.
    #[must_use]
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Set the lock policy.
    #[must_use]
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock = policy;
        self
    }

    /// Parse a configuration from TOML text. Paths are kept as written.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read a configuration from a TOML file, resolving relative paths
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PersistenceError::io("read", path, e))?;
        let config = Self::from_toml_str(&content).map_err(|source| {
            PersistenceError::InvalidConfig {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolve_relative_to(base))
    }

    /// Make `target` and `backup_dir` absolute-or-anchored at `base`.
    #[must_use]
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        if self.target.is_relative() {
            self.target = base.join(&self.target);
        }
        if let Some(dir) = self.backup_dir.take() {
            self.backup_dir = Some(if dir.is_relative() { base.join(dir) } else { dir });
        }
        self
    }
}
