//! Exclusive ownership of the working tree for the duration of a run

use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::offboarding::SetupError;

pub const LOCK_FILE_NAME: &str = "offboarding.lock";

/// Lock file living in the repository's git directory
pub fn lock_path(git_dir: &Path) -> PathBuf {
    git_dir.join(LOCK_FILE_NAME)
}

/// Open (creating if needed) the lock file and wrap it for locking.
///
/// Hold the guard returned by [`try_acquire`] for as long as the run lasts.
pub fn open_lock(git_dir: &Path) -> Result<RwLock<File>, SetupError> {
    let path = lock_path(git_dir);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|source| SetupError::Lock { path, source })?;
    Ok(RwLock::new(file))
}

/// Take the exclusive lock without blocking
pub fn try_acquire<'a>(
    lock: &'a mut RwLock<File>,
    git_dir: &Path,
) -> Result<fd_lock::RwLockWriteGuard<'a, File>, SetupError> {
    lock.try_write().map_err(|source| {
        let path = lock_path(git_dir);
        if source.kind() == ErrorKind::WouldBlock {
            SetupError::Locked(path)
        } else {
            SetupError::Lock { path, source }
        }
    })
}
