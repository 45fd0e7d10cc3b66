//! Repository lock
//!
//! Mutating operations hold a [`RepoLock`] for their whole duration. The lock
//! is an exclusive advisory lock on `.strata/LOCK`, taken without waiting; a
//! second holder fails with [`StrataError::ConcurrentModification`]. The guard
//! releases it on drop, including on error paths and panics that unwind.
//!
//! The operating system drops the lock together with the process that held
//! it, so a killed operation never blocks later ones. The file itself stays
//! in place and records the last holder.

use crate::error::{Result, StrataError};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Name of the lock file inside the state directory
pub const LOCK_FILE: &str = "LOCK";

/// Scoped exclusive lock over a repository
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: File,
}

impl RepoLock {
    /// Take the lock of the repository whose state lives in `state_dir`
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::ConcurrentModification`] if the lock is held.
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(LOCK_FILE);
        let file = open_lock_file(&path)?;

        if FileExt::try_lock_exclusive(&file).is_err() {
            return Err(StrataError::ConcurrentModification(path));
        }

        // The guard exists from here on, so a failed write still unlocks
        let mut lock = Self { path, file };
        lock.file.set_len(0)?;
        writeln!(lock.file, "pid={}", std::process::id())?;
        writeln!(lock.file, "acquired={}", Utc::now().to_rfc3339())?;
        lock.file.flush()?;

        trace!("Acquired repository lock {:?}", lock.path);
        Ok(lock)
    }

    /// Whether another guard currently holds the lock
    pub fn is_locked(state_dir: &Path) -> bool {
        let path = state_dir.join(LOCK_FILE);
        let Ok(file) = open_lock_file(&path) else {
            return false;
        };
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    /// Location of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => trace!("Released repository lock {:?}", self.path),
            Err(e) => warn!("Failed to unlock {:?}: {}", self.path, e),
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}
