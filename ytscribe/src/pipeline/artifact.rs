// pipeline/artifact.rs
//
// Scope guard for files a run creates on disk.

use std::path::{Path, PathBuf};

/// Owns a path for the lifetime of a run stage. When dropped while armed the
/// file is removed; a removal failure is logged and never replaces the error
/// that caused the unwind.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    armed: bool,
}

impl TempArtifact {
    /// Remove `path` when the guard goes out of scope.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Remove `path` on drop only when `cleanup` is set.
    pub fn with_cleanup(path: impl Into<PathBuf>, cleanup: bool) -> Self {
        Self {
            path: path.into(),
            armed: cleanup,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm the guard and hand the path back to the caller.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed temporary file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove temporary file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
