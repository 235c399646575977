//! Persistence error types.
//!
//! All persistence operations return structured errors that provide
//! user-friendly messages and optional remediation hints. Failures inside
//! `load` and `flush` are wrapped in [`PersistenceError::PersistenceFailure`]
//! which keeps the underlying error as its `source`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Why a configuration file could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// The file does not exist.
    Absent,
    /// The file exists but holds only whitespace.
    Empty,
}

impl MissingReason {
    /// Get a human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Absent => "missing",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse classification of a [`PersistenceError`], resolved through wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingConfig,
    NotWritable,
    LockUnavailable,
    InvalidConfig,
    Io,
}

/// Persistence operation error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Configuration file is absent or blank.
    #[error("Configuration file {path} is {reason}")]
    MissingConfig { path: PathBuf, reason: MissingReason },

    /// Write permission check failed before anything was modified.
    #[error("Path {path} is not writable")]
    NotWritable { path: PathBuf },

    /// The exclusive lock could not be obtained within the lock policy.
    #[error("Cannot acquire lock for file {path} (waited {waited:?})")]
    LockUnavailable { path: PathBuf, waited: Duration },

    /// Guard configuration file could not be parsed.
    #[error("Invalid guard configuration: {path}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// File I/O error.
    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A load or flush failed; `source` holds the cause.
    #[error("Unable to {operation} the data at {path}")]
    PersistenceFailure {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: Box<PersistenceError>,
    },
}

impl PersistenceError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn wrap(operation: &'static str, path: &Path, source: PersistenceError) -> Self {
        Self::PersistenceFailure {
            operation,
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    }

    /// Follow `PersistenceFailure` wrappers down to the originating error.
    #[must_use]
    pub fn root_cause(&self) -> &PersistenceError {
        match self {
            Self::PersistenceFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Classify the originating error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.root_cause() {
            Self::MissingConfig { .. } => ErrorKind::MissingConfig,
            Self::NotWritable { .. } => ErrorKind::NotWritable,
            Self::LockUnavailable { .. } => ErrorKind::LockUnavailable,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::Io { .. } | Self::PersistenceFailure { .. } => ErrorKind::Io,
        }
    }

    /// The path this error is about.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::MissingConfig { path, .. }
            | Self::NotWritable { path }
            | Self::LockUnavailable { path, .. }
            | Self::InvalidConfig { path, .. }
            | Self::Io { path, .. }
            | Self::PersistenceFailure { path, .. } => path,
        }
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingConfig { path, reason } => {
                format!("The configuration file at {} is {}.", path.display(), reason)
            }
            Self::NotWritable { path } => {
                format!("Cannot write to {}.", path.display())
            }
            Self::LockUnavailable { path, .. } => {
                format!(
                    "Another process is currently saving {}. Your changes were not written.",
                    path.display()
                )
            }
            Self::InvalidConfig { path, .. } => {
                format!("The guard configuration at {} could not be read.", path.display())
            }
            Self::Io {
                operation, path, ..
            } => {
                format!("Could not {} the file at {}", operation, path.display())
            }
            Self::PersistenceFailure { source, .. } => source.user_message(),
        }
    }

    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::MissingConfig { reason, .. } => match reason {
                MissingReason::Absent => Some("Create a new configuration to get started.".into()),
                MissingReason::Empty => {
                    Some("Restore a backup or save a new configuration over it.".into())
                }
            },
            Self::NotWritable { .. } => {
                Some("Check that you have permission to write to this location.".into())
            }
            Self::LockUnavailable { .. } => Some("Wait a moment and try again.".into()),
            Self::InvalidConfig { .. } => {
                Some("Check the TOML syntax and the `target` entry.".into())
            }
            Self::Io { operation, .. } => {
                if *operation == "read" {
                    Some("Check that the file exists and you have permission to read it.".into())
                } else {
                    Some("Free up disk space or check permissions on the directory.".into())
                }
            }
            Self::PersistenceFailure { source, .. } => source.suggestion(),
        }
    }

    /// Returns whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::LockUnavailable
    }
}

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
