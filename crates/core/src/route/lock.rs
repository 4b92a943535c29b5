//! Exclusive, directory-scoped lock for a route tree.
//!
//! The lock is a `.shadowroute.lock` file created with create-new semantics
//! and holding the owner's PID. A lock left behind by a dead process (or an
//! empty one older than [`EMPTY_LOCK_GRACE`]) is taken over by renaming it
//! aside, so only one of several racing processes can claim it. Dropping the
//! [`TreeLock`] releases it, provided the file still names this process.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::errors::LockError;

/// Name of the lock file inside a route tree.
pub const LOCK_FILE_NAME: &str = ".shadowroute.lock";

/// How long an empty lock file is assumed to belong to a process that is
/// still writing its PID.
pub const EMPTY_LOCK_GRACE: Duration = Duration::from_secs(5);

const MAX_ATTEMPTS: usize = 3;

/// A held route tree lock.
#[derive(Debug)]
pub struct TreeLock {
    path: PathBuf,
    pid: u32,
}

/// What an existing lock file says about its owner.
enum Holder {
    Live(u32),
    /// Safe to take over. Carries the contents that were judged stale.
    Stale(String),
    /// Empty and young: someone is between create and write.
    Pending,
    /// Removed between our create attempt and the read.
    Gone,
}

impl TreeLock {
    /// Acquire the lock for the tree rooted at `root`.
    pub fn acquire(root: &Path) -> Result<Self, LockError> {
        let path = root.join(LOCK_FILE_NAME);

        for _ in 0..MAX_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Self::claim(path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => match inspect(&path)? {
                    Holder::Live(pid) => return Err(LockError::Held { path, pid }),
                    Holder::Pending => return Err(LockError::Busy { path }),
                    Holder::Gone => {}
                    Holder::Stale(seen) => {
                        let holder = seen.trim();
                        warn!(holder, path = %path.display(), "taking over stale route tree lock");
                        take_over(&path, &seen)?;
                    }
                },
                Err(e) => return Err(lock_io(&path, e)),
            }
        }

        Err(LockError::Busy { path })
    }

    /// Write our PID into a freshly created lock file.
    fn claim(path: PathBuf, mut file: File) -> Result<Self, LockError> {
        let pid = std::process::id();
        if let Err(e) = file
            .write_all(pid.to_string().as_bytes())
            .and_then(|()| file.sync_all())
        {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "failed to remove half-written lock file");
            }
            return Err(lock_io(&path, e));
        }
        info!(pid, path = %path.display(), "acquired route tree lock");
        Ok(Self { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TreeLock {
    fn drop(&mut self) {
        match read_pid(&self.path) {
            Ok(Some(pid)) if pid == self.pid => {}
            Ok(_) => {
                warn!(path = %self.path.display(), "lock file no longer names this process, leaving it");
                return;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "lock file vanished before release");
                return;
            }
        }

        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "released route tree lock"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove lock file"),
        }
    }
}

fn lock_io(path: &Path, source: io::Error) -> LockError {
    LockError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Parse the PID from a lock file. `Ok(None)` means the file is empty.
fn read_pid(path: &Path) -> io::Result<Option<u32>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents.trim().parse().ok())
}

fn inspect(path: &Path) -> Result<Holder, LockError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Holder::Gone),
        Err(e) => return Err(lock_io(path, e)),
    };

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or_default();
        return Ok(if age > EMPTY_LOCK_GRACE {
            Holder::Stale(contents)
        } else {
            Holder::Pending
        });
    }

    let pid: u32 = trimmed.parse().map_err(|_| LockError::Corrupt {
        path: path.to_path_buf(),
        detail: format!("expected a PID, found {:?}", trimmed),
    })?;
    if pid == 0 || i32::try_from(pid).is_err() {
        return Err(LockError::Corrupt {
            path: path.to_path_buf(),
            detail: format!("PID {} is out of range", pid),
        });
    }

    Ok(if is_process_alive(pid) {
        Holder::Live(pid)
    } else {
        Holder::Stale(contents)
    })
}

/// Move a stale lock aside and delete it.
///
/// Only one racer's rename can succeed. If the file that got moved is not the
/// one judged stale, another process claimed the lock in between and its
/// file is linked back into place.
fn take_over(path: &Path, seen: &str) -> Result<(), LockError> {
    let aside = path.with_file_name(format!("{}.stale.{}", LOCK_FILE_NAME, std::process::id()));
    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(lock_io(path, e)),
    }

    let moved = fs::read_to_string(&aside).unwrap_or_default();
    if moved.trim() != seen.trim() {
        warn!(path = %path.display(), "lock was claimed during takeover, restoring it");
        if let Err(e) = fs::hard_link(&aside, path) {
            warn!(path = %path.display(), error = %e, "failed to restore claimed lock");
        }
    }

    match fs::remove_file(&aside) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(lock_io(&aside, e)),
    }
}

/// Check whether a process with the given PID is alive.
fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // Signal 0 doesn't send a signal, just checks if process exists
        let ret = unsafe { libc::kill(pid, 0) };
        ret == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}
