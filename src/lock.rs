// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, warn};

use crate::error::LockError;

/// Attempts before giving up on a lock file that keeps being replaced
const MAX_ATTEMPTS: usize = 5;

/// Whether `file` is still the file linked at `path`.
///
/// A holder removes the lock file on release, so a lock won on an unlinked
/// file excludes nobody.
fn is_linked(file: &File, path: &Path) -> std::io::Result<bool> {
    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Advisory single-instance lock holding our PID.
///
/// The lock is released and the file removed when the value is dropped.
pub struct InstanceLock {
    path: PathBuf,
    file: Option<Flock<File>>,
}

impl fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceLock")
            .field("path", &self.path)
            .field("held", &self.file.is_some())
            .finish()
    }
}

impl InstanceLock {
    /// Take the lock without waiting; fails if another process holds it
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let io_error = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut attempt = 0;
        let mut locked = loop {
            attempt += 1;

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .mode(0o644)
                .open(path)
                .map_err(io_error)?;

            let locked = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(locked) => locked,
                Err((_, Errno::EWOULDBLOCK)) => {
                    return Err(LockError::AlreadyHeld(path.to_path_buf()));
                }
                Err((_, errno)) => return Err(io_error(errno.into())),
            };

            if is_linked(&locked, path).map_err(io_error)? {
                break locked;
            }
            if attempt >= MAX_ATTEMPTS {
                return Err(LockError::AlreadyHeld(path.to_path_buf()));
            }
            debug!(path = %path.display(), "lock file replaced while locking, retrying");
        };

        locked.set_len(0).map_err(io_error)?;
        write!(locked, "{}", std::process::id()).map_err(io_error)?;
        locked.flush().map_err(io_error)?;

        debug!(path = %path.display(), "lock acquired");

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(locked),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Remove while still holding the lock so nobody locks a file we delete
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), reason = %e, "unable to remove lock file");
        }
        if let Some(locked) = self.file.take()
            && let Err((_, errno)) = locked.unlock()
        {
            warn!(path = %self.path.display(), reason = %errno, "unable to release lock");
        }
    }
}
