//! Crash-safe persistence for a single configuration file.
//!
//! This crate loads a textual configuration document (such as `satis.json`)
//! and writes updated content back to the same file. The content is opaque:
//! no schema is imposed.
//!
//! # Features
//!
//! - **Atomic writes** (temp file + rename) so the file is never half-written
//! - **Cross-process exclusive lock** around every write, with a bounded wait
//! - **Timestamped backups** of the previous content before each overwrite
//! - **Permission checks** before anything is modified
//!
//! # Example
//!
//! ```ignore
//! use satis_persistence::{FilePersister, GuardConfig, Persister};
//!
//! let config = GuardConfig::new("satis.json").with_backup_dir("backups");
//! let persister = FilePersister::new(config);
//!
//! persister.flush(r#"{"name": "acme/packages"}"#)?;
//! let content = persister.load()?;
//! ```
//!
//! # Architecture
//!
//! The crate is organized into:
//!
//! - `persister.rs` - The guard (`Persister`, `FilePersister`)
//! - `io/` - Filesystem capability and backup snapshot naming
//! - `lock/` - Lock capability and the OS file lock
//! - `clock.rs` - Clock capability used to name backups
//! - `config.rs` - Guard configuration (TOML)
//! - `error.rs` - Error types with user-friendly messages

mod clock;
mod config;
mod error;
mod io;
mod lock;
mod persister;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    DEFAULT_LOCK_POLL_INTERVAL_MS, DEFAULT_LOCK_TIMEOUT_MS, GuardConfig, LockPolicy,
};
pub use error::{ErrorKind, MissingReason, PersistenceError, Result};
pub use io::{
    BACKUP_EXTENSION, BACKUP_TIMESTAMP_FORMAT, BackupSnapshot, Filesystem, LocalFilesystem,
    backup_file_name,
};
pub use lock::{FileLock, FileLockProvider, LockProvider};
pub use persister::{FilePersister, Persister};
