//! Single-instance mutual exclusion.
//!
//! The lock file sits next to the running executable so that two copies of
//! the updater invoked against the same installation can never race each
//! other's commit phase. Acquisition is advisory: `fs2::FileExt` gives us
//! `flock(2)` on unix and `LockFileEx` on Windows behind one call, mirroring
//! the source's own `flock(LOCK_EX | LOCK_NB)` without hand-rolling the
//! platform split.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, UpdaterError};

const LOCK_FILE_NAME: &str = "lockMCMDUpdater";

pub fn lock_file_path() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    Ok(dir.join(LOCK_FILE_NAME))
}

/// A held (or deliberately skipped) single-instance lock. Releases on drop.
pub struct LockHandle {
    path: PathBuf,
    file: Option<File>,
}

impl LockHandle {
    /// Acquires the lock, or returns `UpdaterError::LockHeld` if another
    /// instance already holds it. When `skip_check` is set the lock is
    /// never touched at all -- matching `--skip-lock-check`, which bypasses
    /// acquisition but still runs the transaction.
    pub fn acquire(skip_check: bool) -> Result<Self> {
        let path = lock_file_path()?;
        if skip_check {
            return Ok(LockHandle { path, file: None });
        }

        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(UpdaterError::LockHeld(path));
        }

        set_cloexec(&file);
        Ok(LockHandle { path, file: Some(file) })
    }
}

#[cfg(unix)]
fn set_cloexec(file: &File) {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
}

#[cfg(not(unix))]
fn set_cloexec(_file: &File) {}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = fs2::FileExt::unlock(&file);
            drop(file);
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
