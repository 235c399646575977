//! Cross-process lock backed by an OS advisory lock on a lock file.
//!
//! ## Lock File
//! Path: `<lock_dir>/<file-name>.<hash>.lock`, where `hash` is the first 16
//! hex digits of the SHA-256 of the protected file's path. The path is made
//! absolute and its parent directory canonicalized when it exists, so `..`
//! segments and symlinked directories map to the same lock. The lock file is
//! left in place after release; only the advisory lock matters.
//!
//! A lock file created by another user may not be writable by us. It is then
//! opened read-only, which is enough for an advisory lock.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use fs2::FileExt;
use sha2::{Digest, Sha256};

use super::LockProvider;
use crate::config::LockPolicy;
use crate::error::{PersistenceError, Result};

/// Creates [`FileLock`]s in a lock directory (the system temp dir by default).
#[derive(Debug, Clone)]
pub struct FileLockProvider {
    lock_dir: PathBuf,
}

impl Default for FileLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLockProvider {
    /// Keep lock files in the system temp directory.
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    /// Keep lock files in `lock_dir`. All processes that must exclude each
    /// other have to agree on this directory.
    pub fn in_dir(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Lock file used for `key`.
    pub fn lock_path_for(&self, key: &Path) -> PathBuf {
        let digest = Sha256::digest(lock_key(key).as_os_str().as_encoded_bytes());
        let hash = hex::encode(digest);

        let name: String = key
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let name = if name.is_empty() { "config".to_string() } else { name };

        self.lock_dir.join(format!("{}.{}.lock", name, &hash[..16]))
    }
}

impl LockProvider for FileLockProvider {
    type Guard = FileLock;

    fn acquire(&self, key: &Path, policy: &LockPolicy) -> Result<FileLock> {
        let lock_path = self.lock_path_for(key);
        let file = open_lock_file(&lock_path)
            .map_err(|e| PersistenceError::io("open lock", &lock_path, e))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    tracing::debug!(
                        lock = %lock_path.display(),
                        waited_ms,
                        "Acquired lock for {}",
                        key.display()
                    );
                    return Ok(FileLock {
                        file,
                        path: lock_path,
                    });
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(PersistenceError::io("lock", &lock_path, e)),
            }

            let waited = started.elapsed();
            if waited >= policy.timeout() {
                return Err(PersistenceError::LockUnavailable {
                    path: key.to_path_buf(),
                    waited,
                });
            }
            tracing::debug!("Lock for {} is held elsewhere, waiting", key.display());
            thread::sleep(policy.poll_interval().min(policy.timeout() - waited));
        }
    }
}

/// Absolute form of `key` with its parent directory resolved when it exists.
fn lock_key(key: &Path) -> PathBuf {
    let absolute = std::path::absolute(key).unwrap_or_else(|_| key.to_path_buf());
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().ok().map(|p| p.join(name)),
        _ => None,
    };
    resolved.unwrap_or(absolute)
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
    {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && path.exists() => {
            tracing::debug!("Lock file {} is not writable, opening read-only", path.display());
            File::open(path)
        }
        result => result,
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// A held advisory lock. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well; unlock explicitly to log failures.
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_lock_path_is_stable_and_keyed_by_path() {
        let provider = FileLockProvider::in_dir("/locks");
        let a = provider.lock_path_for(Path::new("/srv/a/satis.json"));
        let b = provider.lock_path_for(Path::new("/srv/b/satis.json"));

        assert_eq!(a, provider.lock_path_for(Path::new("/srv/a/satis.json")));
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("satis.json."));
        assert!(name.ends_with(".lock"));
        assert_eq!(a.parent(), Some(Path::new("/locks")));
    }

    #[test]
    fn test_lock_path_sanitizes_file_name() {
        let provider = FileLockProvider::in_dir("/locks");
        let path = provider.lock_path_for(Path::new("/srv/my config?.json"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("my_config_.json."));
    }

    #[test]
    fn test_lock_path_resolves_parent_segments() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let provider = FileLockProvider::in_dir(dir.path());

        let direct = provider.lock_path_for(&dir.path().join("satis.json"));
        let dotted = provider.lock_path_for(&dir.path().join("sub/../satis.json"));

        assert_eq!(direct, dotted);
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_path_follows_symlinked_directory() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let provider = FileLockProvider::in_dir(dir.path());

        assert_eq!(
            provider.lock_path_for(&real.join("satis.json")),
            provider.lock_path_for(&link.join("satis.json"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_acquire_with_read_only_lock_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let provider = FileLockProvider::in_dir(dir.path());
        let key = dir.path().join("satis.json");
        let lock_path = provider.lock_path_for(&key);
        fs::write(&lock_path, "").unwrap();
        fs::set_permissions(&lock_path, fs::Permissions::from_mode(0o444)).unwrap();

        let held = provider.acquire(&key, &LockPolicy::fail_fast()).unwrap();
        let contender = provider.acquire(&key, &LockPolicy::fail_fast());

        assert!(matches!(
            contender,
            Err(PersistenceError::LockUnavailable { .. })
        ));
        drop(held);
        provider.acquire(&key, &LockPolicy::fail_fast()).unwrap();
    }

    #[test]
    fn test_second_acquire_fails_fast_while_held() {
        let dir = tempdir().unwrap();
        let provider = FileLockProvider::in_dir(dir.path());
        let key = dir.path().join("satis.json");

        let held = provider.acquire(&key, &LockPolicy::default()).unwrap();
        let result = provider.acquire(&key, &LockPolicy::fail_fast());

        assert!(matches!(
            result,
            Err(PersistenceError::LockUnavailable { .. })
        ));
        drop(held);
    }

    #[test]
    fn test_acquire_after_release() {
        let dir = tempdir().unwrap();
        let provider = FileLockProvider::in_dir(dir.path());
        let key = dir.path().join("satis.json");

        let first = provider.acquire(&key, &LockPolicy::fail_fast()).unwrap();
        assert!(first.path().exists());
        drop(first);

        provider.acquire(&key, &LockPolicy::fail_fast()).unwrap();
    }

    #[test]
    fn test_timeout_is_bounded() {
        let dir = tempdir().unwrap();
        let provider = FileLockProvider::in_dir(dir.path());
        let key = dir.path().join("satis.json");
        let policy = LockPolicy {
            timeout_ms: 100,
            poll_interval_ms: 10,
        };

        let _held = provider.acquire(&key, &policy).unwrap();
        let started = Instant::now();
        let err = provider.acquire(&key, &policy).unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            PersistenceError::LockUnavailable { path, waited } => {
                assert_eq!(path, key);
                assert!(waited >= Duration::from_millis(100));
            }
            other => panic!("expected LockUnavailable, got: {other}"),
        }
    }

    #[test]
    fn test_waiting_acquire_succeeds_once_released() {
        let dir = tempdir().unwrap();
        let provider = FileLockProvider::in_dir(dir.path());
        let key = dir.path().join("satis.json");

        let held = provider.acquire(&key, &LockPolicy::default()).unwrap();
        let waiter = {
            let provider = provider.clone();
            let key = key.clone();
            thread::spawn(move || provider.acquire(&key, &LockPolicy::default()).map(|_| ()))
        };
        thread::sleep(Duration::from_millis(100));
        drop(held);

        waiter.join().unwrap().unwrap();
    }
}
