//! Collision-safe symlink creation.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::BuildError;
use crate::Result;
use crate::types::DirectorySet;
use crate::types::Membership;

/// Creates individual symlinks without ever replacing an existing entry.
///
/// Creation relies on the exclusive semantics of `symlink(2)`: the call
/// fails with `EEXIST` when anything occupies the target, so there is no
/// window between checking and creating.
#[derive(Debug, Clone)]
pub struct SymlinkManager {
    allowed: DirectorySet,
}

impl SymlinkManager {
    /// Creates a manager whose allowed directories use exact membership.
    #[must_use]
    pub fn new(allowed_dirs: Vec<PathBuf>) -> Self {
        Self {
            allowed: DirectorySet::new(allowed_dirs, Membership::Exact),
        }
    }

    /// Creates a link at `target` pointing to `source`.
    ///
    /// # Errors
    ///
    /// - [`BuildError::Collision`] when `target` already exists, including
    ///   dangling symlinks
    /// - [`BuildError::Io`] for any other failure
    pub fn create_symlink(&self, source: &Path, target: &Path) -> Result<()> {
        match create_link(source, target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(BuildError::Collision {
                target: target.to_path_buf(),
            }),
            Err(err) => Err(BuildError::Io(io::Error::new(
                err.kind(),
                format!(
                    "failed to create symlink {} -> {}: {err}",
                    target.display(),
                    source.display()
                ),
            ))),
        }
    }

    /// Returns `true` when `dir` is exactly one of the allowed directories.
    ///
    /// Subdirectories of an allowed directory are not allowed; use the path
    /// mapper for descendant checks.
    #[must_use]
    pub fn is_allowed(&self, dir: &Path) -> bool {
        self.allowed.contains(dir)
    }

    /// Allowed directories.
    #[must_use]
    pub fn allowed_dirs(&self) -> &DirectorySet {
        &self.allowed
    }
}

#[cfg(unix)]
fn create_link(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn create_link(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are only supported on unix",
    ))
}
