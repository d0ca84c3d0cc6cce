//! Cross-process advisory lock around container start-up.

use std::fs::{File, OpenOptions};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;

use super::error::LifecycleError;
use super::policy::{LOCK_POLL_INTERVAL, LOCK_WAIT};
use crate::report::EVENT_TARGET;

/// Exclusive lock on a file, released when dropped.
#[derive(Debug)]
pub struct StartupLock {
    file: File,
    path: Utf8PathBuf,
}

impl StartupLock {
    /// Acquires the lock, polling for up to five minutes.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::LockTimeout`] when another process keeps the
    /// lock, or [`LifecycleError::Lock`] when the file cannot be opened.
    pub fn acquire(path: &Utf8Path) -> Result<Self, LifecycleError> {
        Self::acquire_within(path, LOCK_WAIT, LOCK_POLL_INTERVAL)
    }

    /// Acquires the lock, polling every `poll` for up to `wait`.
    ///
    /// # Errors
    ///
    /// See [`Self::acquire`].
    pub fn acquire_within(
        path: &Utf8Path,
        wait: Duration,
        poll: Duration,
    ) -> Result<Self, LifecycleError> {
        // Never truncate: the file may belong to a process holding the lock.
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| LifecycleError::Lock {
                path: path.to_path_buf(),
                source,
            })?;
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!(
                        target: EVENT_TARGET,
                        event = "lock_acquired",
                        path = %path,
                        "startup lock acquired"
                    );
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(error) if is_contended(&error) => {}
                Err(source) => {
                    return Err(LifecycleError::Lock {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
            if started.elapsed() >= wait {
                return Err(LifecycleError::LockTimeout {
                    path: path.to_path_buf(),
                    wait,
                });
            }
            thread::sleep(poll);
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for StartupLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            tracing::warn!(
                target: EVENT_TARGET,
                event = "lock_release_failed",
                path = %self.path,
                error = %error,
                "failed to release startup lock"
            );
        }
    }
}
