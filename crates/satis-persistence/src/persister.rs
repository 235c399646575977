//! The persistence guard.
//!
//! `flush` runs a fixed sequence, each step a possible abort point:
//!
//! 1. permission check on the target (or its directory when absent)
//! 2. exclusive lock keyed by the target path
//! 3. backup of the current file, skipped when there is nothing to copy or
//!    nowhere to put it
//! 4. atomic replace of the target
//!
//! The lock guard lives in the scope of steps 2 to 4 and is dropped before
//! `flush` returns, whatever the outcome.

use std::path::Path;

use crate::clock::{Clock, SystemClock, truncate_to_second};
use crate::config::GuardConfig;
use crate::error::{MissingReason, PersistenceError, Result};
use crate::io::{BackupSnapshot, Filesystem, LocalFilesystem, backup_file_name, parent_dir};
use crate::lock::{FileLockProvider, LockProvider};

/// Loads and stores a configuration document.
pub trait Persister {
    /// Read the document, trimmed of surrounding whitespace.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::MissingConfig`] when the file is absent or blank;
    /// [`PersistenceError::PersistenceFailure`] when it cannot be read.
    fn load(&self) -> Result<String>;

    /// Replace the document with `content`.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::PersistenceFailure`] wrapping the failed step.
    fn flush(&self, content: &str) -> Result<()>;
}

/// File-backed [`Persister`] guarding a single target file.
#[derive(Debug, Clone)]
pub struct FilePersister<F = LocalFilesystem, L = FileLockProvider, C = SystemClock> {
    config: GuardConfig,
    filesystem: F,
    locks: L,
    clock: C,
}

impl FilePersister {
    /// Guard on the local disk with OS file locks and the system clock.
    pub fn new(config: GuardConfig) -> Self {
        Self::with_parts(
            config,
            LocalFilesystem,
            FileLockProvider::default(),
            SystemClock,
        )
    }
}

impl<F, L, C> FilePersister<F, L, C>
where
    F: Filesystem,
    L: LockProvider,
    C: Clock,
{
    /// Guard built from explicit capabilities.
    pub fn with_parts(config: GuardConfig, filesystem: F, locks: L, clock: C) -> Self {
        Self {
            config,
            filesystem,
            locks,
            clock,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// The canonical document file.
    pub fn target(&self) -> &Path {
        &self.config.target
    }

    pub fn backup_dir(&self) -> Option<&Path> {
        self.config.backup_dir.as_deref()
    }

    /// Copy the current document into the backup directory.
    ///
    /// Returns `None` without error when there is no current document, no
    /// backup directory is configured, or the directory is missing or not
    /// writable.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Io`] when the copy itself fails.
    pub fn create_backup(&self) -> Result<Option<BackupSnapshot>> {
        let target = self.target();
        if !self.filesystem.exists(target) {
            tracing::debug!("No current file at {}, skipping backup", target.display());
            return Ok(None);
        }
        let Some(dir) = self.backup_dir() else {
            return Ok(None);
        };
        if !self.filesystem.exists(dir) || !self.filesystem.is_writable(dir) {
            tracing::debug!(
                "Backup directory {} is missing or not writable, skipping backup",
                dir.display()
            );
            return Ok(None);
        }

        let created_at = truncate_to_second(self.clock.now());
        let path = dir.join(backup_file_name(created_at));
        self.filesystem
            .copy(target, &path)
            .map_err(|e| PersistenceError::io("back up", &path, e))?;

        tracing::info!("Backed up {} to {}", target.display(), path.display());
        Ok(Some(BackupSnapshot { created_at, path }))
    }

    /// Backup snapshots in the backup directory, oldest first.
    ///
    /// Files whose names are not snapshot timestamps are ignored.
    pub fn list_backups(&self) -> Result<Vec<BackupSnapshot>> {
        let Some(dir) = self.backup_dir() else {
            return Ok(Vec::new());
        };
        if !self.filesystem.exists(dir) {
            return Ok(Vec::new());
        }

        let mut snapshots: Vec<BackupSnapshot> = self
            .filesystem
            .read_dir(dir)
            .map_err(|e| PersistenceError::io("list", dir, e))?
            .into_iter()
            .filter_map(BackupSnapshot::from_path)
            .collect();
        snapshots.sort();
        Ok(snapshots)
    }

    fn check_permissions(&self) -> Result<()> {
        let target = self.target();
        if self.filesystem.exists(target) {
            if !self.filesystem.is_writable(target) {
                return Err(PersistenceError::NotWritable {
                    path: target.to_path_buf(),
                });
            }
        } else {
            let dir = parent_dir(target);
            if !self.filesystem.is_writable(dir) {
                return Err(PersistenceError::NotWritable {
                    path: dir.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    fn persist(&self, content: &str) -> Result<()> {
        let target = self.target();
        self.check_permissions()?;

        let _lock = self.locks.acquire(target, &self.config.lock)?;
        self.create_backup()?;
        self.filesystem
            .write_atomic(target, content.as_bytes())
            .map_err(|e| PersistenceError::io("write", target, e))
    }
}

impl<F, L, C> Persister for FilePersister<F, L, C>
where
    F: Filesystem,
    L: LockProvider,
    C: Clock,
{
    fn load(&self) -> Result<String> {
        let target = self.target();
        if !self.filesystem.exists(target) {
            return Err(PersistenceError::MissingConfig {
                path: target.to_path_buf(),
                reason: MissingReason::Absent,
            });
        }

        let raw = self.filesystem.read_to_string(target).map_err(|e| {
            PersistenceError::wrap("load", target, PersistenceError::io("read", target, e))
        })?;

        let content = raw.trim();
        if content.is_empty() {
            return Err(PersistenceError::MissingConfig {
                path: target.to_path_buf(),
                reason: MissingReason::Empty,
            });
        }

        tracing::debug!("Loaded {} bytes from {}", content.len(), target.display());
        Ok(content.to_string())
    }

    fn flush(&self, content: &str) -> Result<()> {
        let target = self.target();
        self.persist(content)
            .map_err(|e| PersistenceError::wrap("persist", target, e))?;

        tracing::info!("Saved configuration to {}", target.display());
        Ok(())
    }
}

impl<F, L, C> FilePersister<F, L, C>
where
    F: Filesystem + Clone + 'static,
    L: LockProvider + Clone + 'static,
    C: Clock + Clone + 'static,
{
    /// Load asynchronously.
    ///
    /// Runs [`Persister::load`] on the blocking thread pool to avoid
    /// blocking the async runtime.
    pub async fn load_async(&self) -> Result<String> {
        let persister = self.clone();
        tokio::task::spawn_blocking(move || persister.load())
            .await
            .map_err(|e| self.join_failure("load", e))?
    }

    /// Flush asynchronously.
    ///
    /// Runs [`Persister::flush`] on the blocking thread pool. The write runs
    /// to completion even if the returned future is dropped.
    pub async fn flush_async(&self, content: String) -> Result<()> {
        let persister = self.clone();
        tokio::task::spawn_blocking(move || persister.flush(&content))
            .await
            .map_err(|e| self.join_failure("persist", e))?
    }

    fn join_failure(
        &self,
        operation: &'static str,
        error: tokio::task::JoinError,
    ) -> PersistenceError {
        let target = self.target();
        PersistenceError::wrap(
            operation,
            target,
            PersistenceError::io("complete", target, std::io::Error::other(error)),
        )
    }
}
