//! Filesystem capability.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Filesystem operations the guard relies on.
///
/// Errors are plain `io::Error`s; the guard attaches the operation and path.
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Whether the current process may write to `path` (file or directory).
    /// Returns `false` when `path` does not exist.
    fn is_writable(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace `path` with `contents` so that readers observe either the old
    /// or the new bytes, never a mix.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Copy `from` to `to`, overwriting `to` if present.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Entries of a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// The local disk.
///
/// Atomic writes go through a uniquely named temp file in the target's
/// directory which is synced and then renamed over the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_writable(&self, path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };
        if metadata.permissions().readonly() {
            return false;
        }
        if metadata.is_file() {
            // Opening for append checks effective permissions without touching the content.
            return OpenOptions::new().append(true).open(path).is_ok();
        }
        can_create_in(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let dir = parent_dir(path);
        let mut temp = NamedTempFile::new_in(dir)?;

        temp.write_all(contents)?;
        temp.as_file().sync_all()?;

        // Keep the mode of the file being replaced; the temp file is 0600.
        if let Ok(metadata) = fs::metadata(path) {
            temp.as_file().set_permissions(metadata.permissions())?;
        }

        temp.persist(path).map_err(|e| e.error)?;
        sync_dir(dir);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }
}

/// Directory holding `path`; `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Whether this process may create entries in `dir`.
///
/// Creates and drops an anonymous temp file, so ownership, ACLs and mount
/// flags decide rather than the mode bits.
fn can_create_in(dir: &Path) -> bool {
    match tempfile::tempfile_in(dir) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("Directory {} is not writable: {}", dir.display(), e);
            false
        }
    }
}

/// Persist the rename itself.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("satis.json");

        LocalFilesystem.write_atomic(&path, b"{\"a\":1}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("satis.json");
        fs::write(&path, "old content that is longer than the new one").unwrap();

        LocalFilesystem.write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let entries = LocalFilesystem.read_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![path]);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("satis.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        LocalFilesystem.write_atomic(&path, b"{\"b\":2}").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_write_atomic_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("satis.json");

        assert!(LocalFilesystem.write_atomic(&path, b"{}").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_is_writable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("satis.json");

        assert!(!LocalFilesystem.is_writable(&path));
        assert!(LocalFilesystem.is_writable(dir.path()));

        fs::write(&path, "{}").unwrap();
        assert!(LocalFilesystem.is_writable(&path));

        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms.clone()).unwrap();
        assert!(!LocalFilesystem.is_writable(&path));

        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        fs::set_permissions(&path, perms).unwrap();
    }

    #[test]
    fn test_is_writable_directory_leaves_no_entries() {
        let dir = tempdir().unwrap();

        assert!(LocalFilesystem.is_writable(dir.path()));
        assert!(LocalFilesystem.read_dir(dir.path()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_is_writable_rejects_directory_without_write_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let writable = LocalFilesystem.is_writable(&locked);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(!writable);
    }

    #[test]
    fn test_copy_overwrites() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("a.json");
        let to = dir.path().join("b.json");
        fs::write(&from, "first").unwrap();
        fs::write(&to, "second").unwrap();

        LocalFilesystem.copy(&from, &to).unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "first");
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("satis.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("/srv/satis.json")), Path::new("/srv"));
    }
}
