//! File I/O for the guard.
//!
//! This module handles:
//! - The [`Filesystem`] capability and its local implementation with atomic writes
//! - Backup snapshot naming and discovery

mod backup;
mod filesystem;

pub use backup::{BACKUP_EXTENSION, BACKUP_TIMESTAMP_FORMAT, BackupSnapshot, backup_file_name};
pub use filesystem::{Filesystem, LocalFilesystem};
pub(crate) use filesystem::parent_dir;
