//! Directory membership with explicit semantics.

use std::path::Path;
use std::path::PathBuf;

/// How [`DirectorySet::contains`] compares a path against its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The path must equal a member directory.
    Exact,
    /// The path must equal a member directory or lie below it.
    ///
    /// Comparison is by whole components: `/usr/binx` is not below `/usr/bin`.
    Descendants,
}

/// A set of directories and the membership rule used to test paths.
///
/// # Examples
///
/// ```
/// use safedeb_core::types::{DirectorySet, Membership};
/// use std::path::Path;
///
/// let dirs = vec!["/etc/systemd/system".into()];
/// let exact = DirectorySet::new(dirs.clone(), Membership::Exact);
/// let tree = DirectorySet::new(dirs, Membership::Descendants);
///
/// let unit = Path::new("/etc/systemd/system/app.service");
/// assert!(!exact.contains(unit));
/// assert!(tree.contains(unit));
/// assert!(exact.contains(Path::new("/etc/systemd/system")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySet {
    dirs: Vec<PathBuf>,
    membership: Membership,
}

impl DirectorySet {
    /// Creates a set from `dirs`. Duplicate entries are dropped.
    #[must_use]
    pub fn new(dirs: Vec<PathBuf>, membership: Membership) -> Self {
        let mut unique: Vec<PathBuf> = Vec::with_capacity(dirs.len());
        for dir in dirs {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }
        Self {
            dirs: unique,
            membership,
        }
    }

    /// Returns the same directories under a different membership rule.
    #[must_use]
    pub fn with_membership(&self, membership: Membership) -> Self {
        Self {
            dirs: self.dirs.clone(),
            membership,
        }
    }

    /// Tests `path` against the members using this set's [`Membership`].
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.matching(path).is_some()
    }

    /// Returns the member that `path` matched, if any.
    #[must_use]
    pub fn matching(&self, path: &Path) -> Option<&Path> {
        self.dirs
            .iter()
            .find(|dir| match self.membership {
                Membership::Exact => path == dir.as_path(),
                Membership::Descendants => path.starts_with(dir),
            })
            .map(PathBuf::as_path)
    }

    /// Membership rule in effect.
    #[must_use]
    pub const fn membership(&self) -> Membership {
        self.membership
    }

    /// Member directories in insertion order.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Number of member directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Returns `true` when the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}
