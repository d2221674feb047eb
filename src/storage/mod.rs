use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCOPE_PREFIX: &str = "tubetrace-";

/// Hands out per-request scratch locations under a shared root
///
/// The root may contain unrelated files and may be shared with other processes;
/// each acquisition gets its own randomly named directory inside it.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scratch space under the system temporary directory
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquire a unique path ending in `suffix`
    ///
    /// The file itself is not created. The enclosing directory, and anything written
    /// into it, is removed when the returned [`ScopedPath`] is dropped.
    pub fn acquire(&self, suffix: &str) -> io::Result<ScopedPath> {
        fs_err::create_dir_all(&self.root)?;

        let dir = tempfile::Builder::new()
            .prefix(SCOPE_PREFIX)
            .tempdir_in(&self.root)?;
        let path = dir.path().join(format!("artifact{}", suffix));

        tracing::debug!("Acquired scratch path: {}", path.display());

        Ok(ScopedPath {
            dir: Some(dir),
            path,
        })
    }
}

/// A filesystem path that is deleted when it goes out of scope
#[derive(Debug)]
pub struct ScopedPath {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScopedPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that owns the path; other files written here are removed too
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }
}

impl AsRef<Path> for ScopedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedPath {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        let dir_path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!("Removed scratch directory: {}", dir_path.display()),
            Err(e) => tracing::warn!(
                "Failed to remove scratch directory {}: {}",
                dir_path.display(),
                e
            ),
        }
    }
}
