//! Per-unit write locking.
//!
//! `store` and `delete` for the same unit must not interleave. Writers
//! take an advisory file lock next to the unit's record before touching
//! it: `flock(2)` on Unix, an exclusive-create fallback elsewhere. The
//! lock has a timeout and logs a warning when contention lasts long
//! enough to notice. Readers do not lock; the rename-into-place write
//! path keeps records consistent for them.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Lock result type
pub type LockResult<T> = Result<T, LockError>;

/// Errors from lock operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock timeout after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Advisory write lock for one unit's record.
///
/// Released automatically on drop. The lock file itself stays on disk;
/// only the flock is released.
pub struct UnitLock {
    lock_path: PathBuf,
    #[allow(dead_code)]
    lock_file: File,
}

impl UnitLock {
    const POLL_INTERVAL: Duration = Duration::from_millis(50);
    const CONTENTION_WARN_AFTER: Duration = Duration::from_millis(500);

    /// Acquire the write lock for the unit identified by `file_stem`.
    ///
    /// Creates the cache directory if it does not exist yet. Waits up to
    /// `timeout` for a competing writer to finish.
    pub fn acquire(cache_dir: &Path, file_stem: &str, timeout: Duration) -> LockResult<Self> {
        fs::create_dir_all(cache_dir)?;

        let lock_path = cache_dir.join(format!(".{file_stem}.lock"));
        let start = Instant::now();
        let mut warned = false;

        loop {
            match Self::try_acquire_exclusive(&lock_path) {
                Ok(file) => {
                    if warned {
                        eprintln!(
                            "[cache] lock acquired after {:.1}s contention: {}",
                            start.elapsed().as_secs_f64(),
                            lock_path.display()
                        );
                    }
                    return Ok(Self {
                        lock_path,
                        lock_file: file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !warned && start.elapsed() > Self::CONTENTION_WARN_AFTER {
                        eprintln!(
                            "[cache] WARNING: lock contention on {}, waiting...",
                            lock_path.display()
                        );
                        warned = true;
                    }
                }
                Err(e) => return Err(LockError::Io(e)),
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout(timeout));
            }

            std::thread::sleep(Self::POLL_INTERVAL);
        }
    }

    #[cfg(unix)]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(lock_path)?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            Ok(file)
        } else {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            } else {
                Err(err)
            }
        }
    }

    #[cfg(not(unix))]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        match OpenOptions::new().write(true).create_new(true).open(lock_path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            }
            Err(e) => Err(e),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for UnitLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.lock_file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
