//! Backup snapshot naming.
//!
//! Snapshots are written as `<backup_dir>/<YYYY-MM-DD_HHMMSS>.json`. The name
//! has second resolution, so two backups taken within the same second share a
//! name and the later copy replaces the earlier one.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Serialize;

/// `chrono` format of the snapshot file stem (24-hour clock).
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Extension of snapshot files.
pub const BACKUP_EXTENSION: &str = "json";

/// A backup snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BackupSnapshot {
    /// Local time encoded in the file name.
    pub created_at: NaiveDateTime,
    pub path: PathBuf,
}

impl BackupSnapshot {
    /// Recognise a snapshot by its file name. Other files yield `None`.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let created_at = parse_backup_file_name(name)?;
        Some(Self { created_at, path })
    }

    /// File name of the snapshot.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Snapshot file name for a given instant.
#[must_use]
pub fn backup_file_name(at: NaiveDateTime) -> String {
    format!("{}.{}", at.format(BACKUP_TIMESTAMP_FORMAT), BACKUP_EXTENSION)
}

fn parse_backup_file_name(name: &str) -> Option<NaiveDateTime> {
    let stem = name.strip_suffix(BACKUP_EXTENSION)?.strip_suffix('.')?;
    NaiveDateTime::parse_from_str(stem, BACKUP_TIMESTAMP_FORMAT).ok()
}
