//! Secure path transformation.

use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::BuildError;
use crate::MapperConfig;
use crate::Result;
use crate::types::DirectorySet;
use crate::types::Membership;
use crate::types::PathMapping;
use crate::types::clean_path;

/// Result of [`PathMapper::transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Location below the secure root.
    pub path: PathBuf,
    /// Whether the original location must be materialized as a symlink.
    pub needs_symlink: bool,
}

/// Maps system paths to their isolated equivalents.
///
/// The mapper is a pure function of its configuration: it never touches the
/// filesystem. Matching is lexical and component-wise, after the input has
/// been normalized with [`clean_path`].
///
/// # Examples
///
/// ```
/// use safedeb_core::MapperConfig;
/// use safedeb_core::security::PathMapper;
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mapper = PathMapper::new(&MapperConfig::default());
///
/// let unit = mapper.transform(Path::new("/etc/systemd/system/app.service"))?;
/// assert_eq!(unit.path, Path::new("/opt/etc/systemd/system/app.service"));
/// assert!(unit.needs_symlink);
///
/// let again = mapper.transform(&unit.path)?;
/// assert_eq!(again.path, unit.path);
/// assert!(!again.needs_symlink);
///
/// assert!(mapper.transform(Path::new("/srv/data")).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PathMapper {
    secure_root: PathBuf,
    mappings: PathMapping,
    symlink_dirs: DirectorySet,
}

impl PathMapper {
    /// Creates a mapper from `config`.
    #[must_use]
    pub fn new(config: &MapperConfig) -> Self {
        Self {
            secure_root: clean_path(&config.secure_root),
            mappings: PathMapping::new(config.mappings.iter().cloned()),
            symlink_dirs: DirectorySet::new(
                config.symlink_dirs.iter().map(|d| clean_path(d)).collect(),
                Membership::Descendants,
            ),
        }
    }

    /// Maps `path` below the secure root.
    ///
    /// Paths already below the secure root are returned unchanged and never
    /// need a symlink. Otherwise the longest matching system prefix is
    /// replaced by its secure prefix, and a symlink is requested when the
    /// normalized original lies in a symlink-required directory.
    ///
    /// # Errors
    ///
    /// - [`BuildError::EmptyPath`] for an empty input
    /// - [`BuildError::NoRuleMatched`] when no system prefix matches
    pub fn transform(&self, path: &Path) -> Result<Transformed> {
        if path.as_os_str().is_empty() {
            return Err(BuildError::EmptyPath);
        }
        let normalized = clean_path(path);

        if self.is_transformed(&normalized) {
            debug!(path = %normalized.display(), "path already transformed");
            return Ok(Transformed {
                path: normalized,
                needs_symlink: false,
            });
        }

        let transformed = self
            .mappings
            .resolve(&normalized)
            .and_then(|rule| rule.apply(&normalized))
            .ok_or_else(|| BuildError::NoRuleMatched {
                path: path.to_path_buf(),
            })?;

        let needs_symlink = self.needs_symlink(&normalized);
        debug!(
            from = %normalized.display(),
            to = %transformed.display(),
            needs_symlink,
            "transformed path"
        );

        Ok(Transformed {
            path: transformed,
            needs_symlink,
        })
    }

    /// Returns `true` when `path` lies in a symlink-required directory.
    #[must_use]
    pub fn needs_symlink(&self, path: &Path) -> bool {
        self.symlink_dirs.contains(&clean_path(path))
    }

    /// Returns `true` when `path` is already below the secure root.
    #[must_use]
    pub fn is_transformed(&self, path: &Path) -> bool {
        !path.as_os_str().is_empty() && clean_path(path).starts_with(&self.secure_root)
    }

    /// Returns `true` when a mapping rule covers `path`.
    #[must_use]
    pub fn is_system_path(&self, path: &Path) -> bool {
        !path.as_os_str().is_empty() && self.mappings.resolve(&clean_path(path)).is_some()
    }

    /// The secure root.
    #[must_use]
    pub fn secure_root(&self) -> &Path {
        &self.secure_root
    }

    /// The ordered mapping table.
    #[must_use]
    pub fn mappings(&self) -> &PathMapping {
        &self.mappings
    }

    /// Symlink-required directories, with [`Membership::Descendants`].
    #[must_use]
    pub fn symlink_dirs(&self) -> &DirectorySet {
        &self.symlink_dirs
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new(&MapperConfig::default())
    }
}
