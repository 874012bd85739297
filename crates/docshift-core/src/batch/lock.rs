//! Exclusive lock on a destination directory

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

pub const LOCK_FILE_NAME: &str = ".docshift.lock";

/// Held for the duration of one batch run; removes the lock file on drop
#[derive(Debug)]
pub struct DestinationLock {
    path: PathBuf,
}

impl DestinationLock {
    /// Create the lock file, failing with `AlreadyExists` if another run holds it
    pub fn acquire(dest_dir: &Path) -> io::Result<Self> {
        let path = dest_dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_fails_until_released() {
        let dir = TempDir::new().unwrap();

        let lock = DestinationLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = DestinationLock::acquire(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
        assert!(DestinationLock::acquire(dir.path()).is_ok());
    }
}
