//! Advisory build lock.
//!
//! Index construction is single-writer: the builder holds an exclusive lock
//! on `<index>.lock` for the whole build so that two builds of the same
//! target cannot interleave. Readers never take the lock.
//!
//! The lock file is created on first use and left in place afterwards. The
//! lock itself is released when the [`BuildLock`] is dropped.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, Result as IoResult};
use std::path::{Path, PathBuf};

use crate::storage::traits::StorageError;

/// Exclusive lock guarding builds of one index file.
#[derive(Debug)]
pub struct BuildLock {
    _file: File,
    path: PathBuf,
}

impl BuildLock {
    /// Returns the lock file path for an index file.
    #[must_use]
    pub fn lock_path(index_path: &Path) -> PathBuf {
        let mut name = index_path
            .file_name()
            .map_or_else(|| OsString::from("index"), ToOwned::to_owned);
        name.push(".lock");
        index_path.with_file_name(name)
    }

    /// Takes the build lock for `index_path` without waiting.
    ///
    /// # Errors
    /// - [`StorageError::Locked`] if another build of the same index holds it
    /// - [`StorageError::Unavailable`] if the lock file cannot be opened or
    ///   locked at all
    pub fn acquire(index_path: &Path) -> Result<Self, StorageError> {
        let path = Self::lock_path(index_path);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| lock_failed(index_path, &path, &e))?;

        match try_lock_exclusive(&file) {
            Ok(true) => {
                tracing::debug!(lock = %path.display(), "build lock taken");
                Ok(Self { _file: file, path })
            }
            Ok(false) => {
                tracing::warn!(lock = %path.display(), "build lock held elsewhere");
                Err(StorageError::Locked { path })
            }
            Err(e) => Err(lock_failed(index_path, &path, &e)),
        }
    }

    /// Returns the path to the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_failed(index_path: &Path, lock_path: &Path, err: &IoError) -> StorageError {
    StorageError::Unavailable {
        path: index_path.to_path_buf(),
        reason: format!("cannot lock {}: {err}", lock_path.display()),
    }
}

/// Returns `Ok(false)` when the lock is contended.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor stays owned by `file` for the whole call.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

/// Returns `Ok(false)` when the lock is contended.
#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: `handle` is owned by `file`; LockFileEx expects a zeroed OVERLAPPED.
    let locked = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            handle,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if locked != 0 {
        return Ok(true);
    }
    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock_exclusive(_file: &File) -> IoResult<bool> {
    Err(IoError::new(
        std::io::ErrorKind::Unsupported,
        "file locking not supported on this platform",
    ))
}
