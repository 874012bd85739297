//! Per-request scratch directories
//!
//! Each request gets its own directory under the configured workspace root.
//! The directory is removed when the guard is closed or dropped, whichever
//! comes first, so every exit path (including a cancelled request) cleans up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

const INPUT_FILE: &str = "input.html";
const OUTPUT_FILE: &str = "output.html";

pub struct RequestWorkspace {
    dir: TempDir,
}

impl RequestWorkspace {
    pub fn create(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("req-").tempdir_in(root)?;
        debug!(workspace = %dir.path().display(), "Workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the materialized input document goes
    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join(INPUT_FILE)
    }

    /// Where the engine is told to write
    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_FILE)
    }

    /// Remove the directory now, logging instead of failing the request
    pub fn close(self) {
        let path = self.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(workspace = %path.display(), "Workspace removed"),
            Err(e) => warn!(workspace = %path.display(), error = %e, "Failed to remove workspace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspaces_are_isolated_and_removed() {
        let root = TempDir::new().unwrap();
        let a = RequestWorkspace::create(root.path()).unwrap();
        let b = RequestWorkspace::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.input_path().starts_with(a.path()));
        assert_ne!(a.input_path(), a.output_path());

        fs::write(a.input_path(), "x").unwrap();
        a.close();
        drop(b);

        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn creates_missing_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        let ws = RequestWorkspace::create(&nested).unwrap();
        assert!(ws.path().starts_with(&nested));
    }
}
