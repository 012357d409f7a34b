//! Structural and defense-in-depth path validation.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;
use walkdir::WalkDir;

use super::rules::CONTROL_DIR;
use super::rules::CONTROL_WHITELIST;
use super::rules::ENCODED_TRAVERSAL;
use super::rules::SCRIPT_EXTENSIONS;
use super::rules::SHELL_MARKERS;
use super::rules::UNICODE_TRAVERSAL;
use crate::BuildError;
use crate::Result;
use crate::SecurityPolicy;
use crate::types::clean_path;
use crate::types::has_parent_segment;

/// Validates individual paths, symlink pairs and whole staging trees.
///
/// # Examples
///
/// ```
/// use safedeb_core::SecurityPolicy;
/// use safedeb_core::security::PathValidator;
/// use std::path::Path;
///
/// let validator = PathValidator::new(SecurityPolicy::default());
///
/// assert!(validator.validate_path(Path::new("/opt/etc/app.conf")).is_ok());
/// assert!(validator.validate_path(Path::new("/usr/bin/tool")).is_err());
/// assert!(validator.validate_path_traversal(Path::new("/opt/%2e%2e/etc")).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PathValidator {
    policy: SecurityPolicy,
}

impl PathValidator {
    /// Creates a validator enforcing `policy`.
    #[must_use]
    pub fn new(policy: SecurityPolicy) -> Self {
        Self { policy }
    }

    /// The policy in force.
    #[must_use]
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Checks a single absolute path against the policy.
    ///
    /// Restricted prefixes and unlisted extensions only log a warning. Paths
    /// below the secure root skip the extension advisory.
    ///
    /// # Errors
    ///
    /// - [`BuildError::EmptyPath`], [`BuildError::NotAbsolute`]
    /// - [`BuildError::PathTooLong`] above `max_path_length` bytes
    /// - [`BuildError::DotDotSegment`] when the path has `..` segments and
    ///   the policy disallows them
    /// - [`BuildError::ForbiddenPath`] for forbidden prefixes
    pub fn validate_path(&self, path: &Path) -> Result<()> {
        let raw = path.as_os_str();
        if raw.is_empty() {
            return Err(BuildError::EmptyPath);
        }
        if !path.has_root() {
            return Err(BuildError::NotAbsolute {
                path: path.to_path_buf(),
            });
        }
        if raw.len() > self.policy.max_path_length {
            return Err(BuildError::PathTooLong {
                path: path.to_path_buf(),
                len: raw.len(),
                max: self.policy.max_path_length,
            });
        }
        if self.policy.disallow_dot_dot && has_parent_segment(path) {
            return Err(BuildError::DotDotSegment {
                path: path.to_path_buf(),
            });
        }

        let clean = clean_path(path);
        if let Some(rule) = self.forbidden_prefix(&clean) {
            return Err(BuildError::ForbiddenPath {
                path: path.to_path_buf(),
                rule: rule.to_path_buf(),
            });
        }

        if let Some(rule) = first_prefix(&self.policy.restricted_paths, &clean) {
            warn!(
                path = %path.display(),
                rule = %rule.display(),
                "accessing restricted path"
            );
        }

        if clean.starts_with(&self.policy.secure_root) {
            return Ok(());
        }

        if let Some(ext) = clean.extension().and_then(|e| e.to_str())
            && !self.policy.is_extension_allowed(ext)
        {
            warn!(path = %path.display(), ext, "file has potentially unsafe extension");
        }

        Ok(())
    }

    /// Scans for traversal tricks that survive naive normalization.
    ///
    /// Rejects literal `..` segments, percent-encoded and overlong-UTF-8
    /// dot-dot forms, backslash and look-alike unicode forms, dot-dot hidden
    /// behind doubled slashes, and NUL bytes. `~`, `$` and backticks only
    /// produce a warning.
    ///
    /// # Errors
    ///
    /// [`BuildError::EmptyPath`] or [`BuildError::PathTraversal`].
    pub fn validate_path_traversal(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(BuildError::EmptyPath);
        }
        let text = path.to_string_lossy();
        let reject = |pattern: &str| -> Result<()> {
            Err(BuildError::PathTraversal {
                path: text.to_string(),
                pattern: pattern.to_string(),
            })
        };

        if text.contains('\0') {
            return reject("null byte");
        }
        if has_parent_segment(path) {
            return reject("'..' segment");
        }

        let lowered = text.to_lowercase();
        if let Some(encoded) = ENCODED_TRAVERSAL.iter().find(|p| lowered.contains(*p)) {
            return reject(&format!("encoded traversal '{encoded}'"));
        }
        if let Some(variant) = UNICODE_TRAVERSAL.iter().find(|p| text.contains(*p)) {
            return reject(&format!("unicode traversal '{variant}'"));
        }
        if text.contains("//") && text.split('/').any(|segment| segment == "..") {
            return reject("'..' behind repeated separators");
        }

        for marker in SHELL_MARKERS {
            if text.contains(*marker) {
                warn!(path = %text, %marker, "path contains shell metacharacter");
            }
        }

        Ok(())
    }

    /// Checks that a symlink at `target` pointing to `source` may be created.
    ///
    /// The existence check uses `symlink_metadata`, so a dangling link at
    /// `target` also counts as existing.
    ///
    /// # Errors
    ///
    /// - any [`validate_path`](Self::validate_path) error for either path
    /// - [`BuildError::SymlinkForbiddenTarget`]
    /// - [`BuildError::SymlinkTargetExists`]
    /// - [`BuildError::SymlinkCycle`] when `target` lies below `source`
    pub fn validate_symlink(&self, source: &Path, target: &Path) -> Result<()> {
        self.validate_path(source)?;
        if !target.as_os_str().is_empty() && self.forbidden_prefix(&clean_path(target)).is_some() {
            return Err(BuildError::SymlinkForbiddenTarget {
                target: target.to_path_buf(),
            });
        }
        self.validate_path(target)?;

        if fs::symlink_metadata(target).is_ok() {
            return Err(BuildError::SymlinkTargetExists {
                target: target.to_path_buf(),
            });
        }

        // Prefix heuristic only: cycles through intermediate links are missed.
        if clean_path(target).starts_with(clean_path(source)) {
            return Err(BuildError::SymlinkCycle {
                source_path: source.to_path_buf(),
                target: target.to_path_buf(),
            });
        }

        Ok(())
    }

    /// Validates one payload entry given as its absolute install path.
    ///
    /// # Errors
    ///
    /// Any [`validate_path`](Self::validate_path) error.
    pub fn validate_package_file(&self, path: &Path, is_dir: bool) -> Result<()> {
        self.validate_path(path)?;
        if is_dir {
            return Ok(());
        }

        let is_script = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));
        if is_script {
            warn!(path = %path.display(), "package contains executable script");
        }
        if path.starts_with(self.policy.secure_root.join("home")) {
            warn!(path = %path.display(), "files below the isolated home directory are non-standard");
        }
        Ok(())
    }

    /// Audits a complete staging tree.
    ///
    /// The tree must contain `DEBIAN/control`. Inside `DEBIAN` only the
    /// whitelisted control files are allowed; any other entry, including
    /// subdirectories, is invalid. Every other entry is checked with
    /// [`validate_package_file`](Self::validate_package_file) as `/<relative>`.
    ///
    /// # Errors
    ///
    /// - [`BuildError::SourceNotFound`] when `root` is not a directory
    /// - [`BuildError::MissingControlDir`], [`BuildError::MissingControlFile`]
    /// - [`BuildError::AuditFailed`] listing every invalid entry
    /// - [`BuildError::Io`] when the tree cannot be walked
    pub fn validate_package(&self, root: &Path) -> Result<()> {
        if !root.is_dir() {
            return Err(BuildError::SourceNotFound {
                path: root.to_path_buf(),
            });
        }

        let control_dir = root.join(CONTROL_DIR);
        if !control_dir.is_dir() {
            return Err(BuildError::MissingControlDir {
                dir: CONTROL_DIR.to_string(),
            });
        }
        let control_file = control_dir.join("control");
        if !control_file.is_file() {
            return Err(BuildError::MissingControlFile { path: control_file });
        }

        let mut invalid: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| std::io::Error::other(format!("walkdir error: {e}")))?;
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let is_dir = entry.file_type().is_dir();

            if let Ok(inside) = relative.strip_prefix(CONTROL_DIR) {
                if inside.as_os_str().is_empty() {
                    continue;
                }
                let allowed = !is_dir
                    && inside.components().count() == 1
                    && inside
                        .to_str()
                        .is_some_and(|name| CONTROL_WHITELIST.contains(&name));
                if !allowed {
                    warn!(entry = %relative.display(), "invalid entry in control directory");
                    invalid.push(relative.to_path_buf());
                }
                continue;
            }

            let install_path = Path::new("/").join(relative);
            if let Err(err) = self.validate_package_file(&install_path, is_dir) {
                warn!(entry = %relative.display(), error = %err, "invalid package file");
                invalid.push(relative.to_path_buf());
            }
        }

        if invalid.is_empty() {
            debug!(root = %root.display(), "package audit passed");
            Ok(())
        } else {
            Err(BuildError::AuditFailed { invalid })
        }
    }

    fn forbidden_prefix(&self, clean: &Path) -> Option<&Path> {
        first_prefix(&self.policy.forbidden_paths, clean)
    }
}

fn first_prefix<'a>(prefixes: &'a [PathBuf], path: &Path) -> Option<&'a Path> {
    prefixes
        .iter()
        .find(|prefix| path.starts_with(prefix))
        .map(PathBuf::as_path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn validator() -> PathValidator {
        PathValidator::default()
    }

    #[test]
    fn test_validate_path_basic_rejections() {
        let v = validator();
        assert!(matches!(v.validate_path(Path::new("")), Err(BuildError::EmptyPath)));
        assert!(matches!(
            v.validate_path(Path::new("etc/app.conf")),
            Err(BuildError::NotAbsolute { .. })
        ));
        let long = format!("/opt/{}", "a".repeat(5000));
        assert!(matches!(
            v.validate_path(Path::new(&long)),
            Err(BuildError::PathTooLong { max: 4096, .. })
        ));
    }

    #[test]
    fn test_validate_path_forbidden_prefixes() {
        let v = validator();
        for path in ["/bin", "/usr/sbin/daemon", "/proc/1/mem", "/dev/sda"] {
            let err = v.validate_path(Path::new(path)).unwrap_err();
            assert!(err.is_policy_violation(), "{path} should be forbidden");
        }
        assert!(v.validate_path(Path::new("/binaries/tool")).is_ok());
    }

    #[test]
    fn test_validate_path_dot_dot() {
        let v = validator();
        assert!(matches!(
            v.validate_path(Path::new("/opt/../etc/passwd")),
            Err(BuildError::DotDotSegment { .. })
        ));
        let relaxed = PathValidator::new(SecurityPolicy {
            disallow_dot_dot: false,
            ..SecurityPolicy::default()
        });
        assert!(relaxed.validate_path(Path::new("/opt/x/../etc/app.conf")).is_ok());
        assert!(relaxed.validate_path(Path::new("/opt/../usr/bin/x")).is_err());
    }

    #[test]
    fn test_validate_path_advisories_do_not_fail() {
        let v = validator();
        assert!(v.validate_path(Path::new("/etc/shadow")).is_ok());
        assert!(v.validate_path(Path::new("/etc/lib.so")).is_ok());
        assert!(v.validate_path(Path::new("/opt/etc/app.service")).is_ok());
    }

    #[test]
    fn test_traversal_catalogue_rejected() {
        let v = validator();
        let attacks = [
            "/opt/../etc",
            "/opt/%2e%2e/etc",
            "/opt/%2E%2E/etc",
            "/opt/%252e%252e/etc",
            "/opt/%2e./etc",
            "/opt/..%2fetc",
            "/opt/%c0%ae%c0%ae/etc",
            "/opt/..\\etc",
            "/opt/\u{ff0e}\u{ff0e}/etc",
            "/opt/..\u{2215}etc",
            "/opt/a\0b",
        ];
        for attack in attacks {
            assert!(
                matches!(
                    v.validate_path_traversal(Path::new(attack)),
                    Err(BuildError::PathTraversal { .. })
                ),
                "{attack:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_traversal_accepts_single_dots_and_markers() {
        let v = validator();
        assert!(v.validate_path_traversal(Path::new("/opt/./app/./bin")).is_ok());
        assert!(v.validate_path_traversal(Path::new("/opt/app/file.tar.gz")).is_ok());
        assert!(v.validate_path_traversal(Path::new("/opt/~user/$HOME")).is_ok());
        assert!(v.validate_path_traversal(Path::new("/opt/app..name")).is_ok());
    }

    #[test]
    fn test_validate_symlink_rules() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let v = validator();
        let source = temp.path().join("real");
        let target = temp.path().join("link");
        assert!(v.validate_symlink(&source, &target).is_ok());

        assert!(matches!(
            v.validate_symlink(&source, Path::new("/usr/bin/tool")),
            Err(BuildError::SymlinkForbiddenTarget { .. })
        ));

        fs::write(&target, b"x").unwrap();
        assert!(matches!(
            v.validate_symlink(&source, &target),
            Err(BuildError::SymlinkTargetExists { .. })
        ));

        assert!(matches!(
            v.validate_symlink(&source, &source.join("nested")),
            Err(BuildError::SymlinkCycle { .. })
        ));
    }

    #[test]
    fn test_validate_symlink_detects_dangling_link() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let target = temp.path().join("dangling");
        std::os::unix::fs::symlink(temp.path().join("missing"), &target).unwrap();
        assert!(matches!(
            validator().validate_symlink(&temp.path().join("src"), &target),
            Err(BuildError::SymlinkTargetExists { .. })
        ));
    }

    fn staging() -> TempDir {
        let temp = TempDir::new().expect("failed to create temp dir");
        fs::create_dir_all(temp.path().join("DEBIAN")).unwrap();
        fs::write(temp.path().join("DEBIAN/control"), "Package: demo\n").unwrap();
        fs::create_dir_all(temp.path().join("opt/etc/demo")).unwrap();
        fs::write(temp.path().join("opt/etc/demo/demo.conf"), "k=v\n").unwrap();
        temp
    }

    #[test]
    fn test_validate_package_ok() {
        let temp = staging();
        fs::write(temp.path().join("DEBIAN/postinst"), "#!/bin/sh\n").unwrap();
        assert!(validator().validate_package(temp.path()).is_ok());
    }

    #[test]
    fn test_validate_package_missing_control_dir() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let err = validator().validate_package(temp.path()).unwrap_err();
        assert!(matches!(err, BuildError::MissingControlDir { .. }));
        assert!(err.to_string().contains("DEBIAN"));
    }

    #[test]
    fn test_validate_package_missing_control_file() {
        let temp = TempDir::new().expect("failed to create temp dir");
        fs::create_dir(temp.path().join("DEBIAN")).unwrap();
        let err = validator().validate_package(temp.path()).unwrap_err();
        assert!(matches!(err, BuildError::MissingControlFile { .. }));
        assert!(err.to_string().contains("control"));
    }

    #[test]
    fn test_validate_package_rejects_unknown_control_entries() {
        let temp = staging();
        fs::write(temp.path().join("DEBIAN/evil"), "x").unwrap();
        fs::create_dir(temp.path().join("DEBIAN/nested")).unwrap();
        let err = validator().validate_package(temp.path()).unwrap_err();
        match err {
            BuildError::AuditFailed { invalid } => {
                assert_eq!(invalid.len(), 2);
                assert!(invalid.contains(&PathBuf::from("DEBIAN/evil")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_package_rejects_forbidden_payload() {
        let temp = staging();
        fs::create_dir_all(temp.path().join("usr/bin")).unwrap();
        fs::write(temp.path().join("usr/bin/tool"), "x").unwrap();
        let err = validator().validate_package(temp.path()).unwrap_err();
        assert!(err.to_string().contains("invalid files"));
        assert!(err.is_policy_violation());
    }
}
