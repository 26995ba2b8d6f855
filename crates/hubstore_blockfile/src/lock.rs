//! Process-exclusive directory lock.
//!
//! The lock is an advisory lock on an empty `FLOCK` file in the repository
//! root. It keeps two block files from being opened on the same directory
//! at once.
//!
//! # Platform caveats
//!
//! On Unix this is `flock(2)`, on Windows `LockFileEx`. Both are released
//! by the OS when the holding process dies, but network filesystems may
//! ignore or emulate them, and a stale lock can survive a crash there. The
//! lock guards against accidental double opens, not against every failure
//! mode; crash safety comes from table repair.

use crate::error::{BlockFileError, BlockFileResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Name of the lock file within the repository root.
pub const LOCK_FILE: &str = "FLOCK";

/// An exclusive lock on a block file directory.
///
/// The lock is held until [`DirLock::release`] is called or the value is
/// dropped.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    file: File,
}

impl DirLock {
    /// Acquires the lock for `root` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::Locked`] if the lock is already held, or an
    /// I/O error if the lock file cannot be created or the lock call fails
    /// for any other reason.
    pub fn acquire(root: &Path) -> BlockFileResult<Self> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Err(BlockFileError::Locked { path });
            }
            return Err(e.into());
        }

        Ok(Self { path, file })
    }

    /// Returns the path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to unlock the file.
    pub fn release(self) -> BlockFileResult<()> {
        self.file.unlock()?;
        Ok(())
    }
}

/// Returns true if `err` means another holder has the lock.
fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_lock_file() {
        let dir = tempdir().unwrap();
        let lock = DirLock::acquire(dir.path()).unwrap();
        assert_eq!(lock.path(), dir.path().join("FLOCK"));
        assert!(dir.path().join("FLOCK").exists());
    }

    #[test]
    fn second_acquire_fails() {
        let dir = tempdir().unwrap();
        let _lock = DirLock::acquire(dir.path()).unwrap();

        let result = DirLock::acquire(dir.path());
        assert!(matches!(result, Err(BlockFileError::Locked { .. })));
    }

    #[test]
    fn only_contention_counts_as_locked() {
        assert!(is_contended(&fs2::lock_contended_error()));
        assert!(is_contended(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_contended(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn release_allows_reacquire() {
        let dir = tempdir().unwrap();
        DirLock::acquire(dir.path()).unwrap().release().unwrap();
        let _lock = DirLock::acquire(dir.path()).unwrap();
    }

    #[test]
    fn drop_releases() {
        let dir = tempdir().unwrap();
        {
            let _lock = DirLock::acquire(dir.path()).unwrap();
        }
        let _lock = DirLock::acquire(dir.path()).unwrap();
    }
}
