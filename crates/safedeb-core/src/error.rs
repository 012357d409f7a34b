//! Error types for secure package building.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `BuildError`.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Coarse classification of a [`BuildError`].
///
/// Callers use the category to decide how to surface an error; the CLI maps
/// categories to hints, and the builder uses them to tell policy failures
/// apart from environmental ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Forbidden path, traversal pattern or package audit failure.
    PolicyViolation,
    /// A lifecycle script breached the configured security level.
    RiskThresholdExceeded,
    /// Something already exists where a symlink was to be placed.
    Collision,
    /// No mapping rule matched a path.
    TransformationFailure,
    /// The build exceeded its time budget or was cancelled.
    Timeout,
    /// The external archiver failed.
    ExternalToolFailure,
    /// Underlying filesystem failure.
    Io,
    /// Invalid input supplied by the caller (metadata, script names).
    Usage,
}

/// Errors that can occur while transforming, validating and packaging a
/// source tree.
#[derive(Error, Debug)]
pub enum BuildError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An empty path was supplied.
    #[error("path cannot be empty")]
    EmptyPath,

    /// A relative path was supplied where an absolute one is required.
    #[error("path must be absolute: {path}")]
    NotAbsolute {
        /// The offending path.
        path: PathBuf,
    },

    /// Path exceeds the configured maximum length.
    #[error("path exceeds maximum length of {max} characters ({len}): {path}")]
    PathTooLong {
        /// The offending path.
        path: PathBuf,
        /// Length of the path in bytes.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Path lies under a forbidden prefix.
    #[error("path access forbidden: {path} (matches {rule})")]
    ForbiddenPath {
        /// The offending path.
        path: PathBuf,
        /// The forbidden prefix that matched.
        rule: PathBuf,
    },

    /// Path contains literal `..` segments while the policy disallows them.
    #[error("path contains forbidden '..' sequences: {path}")]
    DotDotSegment {
        /// The offending path.
        path: PathBuf,
    },

    /// A traversal pattern was detected by the defense-in-depth scan.
    #[error("path traversal detected in {path}: {pattern}")]
    PathTraversal {
        /// The offending path (lossy rendering).
        path: String,
        /// Description of the pattern that triggered.
        pattern: String,
    },

    /// No configured system prefix matched the path.
    #[error("no transformation rule matched for path: {path}")]
    NoRuleMatched {
        /// The untransformable path.
        path: PathBuf,
    },

    /// A symlink target already exists on the host.
    #[error("symlink target already exists: {target}")]
    SymlinkTargetExists {
        /// The existing target.
        target: PathBuf,
    },

    /// A symlink target falls under a forbidden prefix.
    #[error("symlink target points to forbidden path: {target}")]
    SymlinkForbiddenTarget {
        /// The forbidden target.
        target: PathBuf,
    },

    /// The symlink target is nested below its own source.
    #[error("symlink would create a cycle: {source_path} -> {target}")]
    SymlinkCycle {
        /// Source the link points to.
        source_path: PathBuf,
        /// Location of the link.
        target: PathBuf,
    },

    /// Another queued request already uses this target.
    #[error("duplicate symlink target: {target}")]
    DuplicateSymlinkTarget {
        /// The duplicated target.
        target: PathBuf,
    },

    /// An entry appeared at the target before the link could be created.
    #[error("collision detected: target {target} already exists")]
    Collision {
        /// The colliding target.
        target: PathBuf,
    },

    /// One or more queued symlinks could not be created.
    #[error("failed to create {failed} of {total} symlinks")]
    SymlinkFlushFailed {
        /// Number of failed entries.
        failed: usize,
        /// Number of entries processed.
        total: usize,
    },

    /// A lifecycle script breached the configured security level.
    #[error("script validation failed for {script}. {assessment}{}", format_issues(.errors))]
    ScriptRejected {
        /// Script slot name.
        script: String,
        /// Rendered risk assessment.
        assessment: String,
        /// Error-level findings.
        errors: Vec<String>,
    },

    /// Unknown lifecycle script slot.
    #[error("invalid maintainer script name: {name}")]
    InvalidScriptName {
        /// The rejected name.
        name: String,
    },

    /// A script analysis pattern failed to compile.
    #[error("invalid script pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// Package metadata is incomplete or malformed.
    #[error("invalid package metadata: {reason}")]
    InvalidMetadata {
        /// Reason for rejection.
        reason: String,
    },

    /// Staging tree lacks the control directory.
    #[error("{dir} directory missing from package")]
    MissingControlDir {
        /// Expected directory name.
        dir: String,
    },

    /// Control directory lacks the control file.
    #[error("control file missing from package: {path}")]
    MissingControlFile {
        /// Expected control file path.
        path: PathBuf,
    },

    /// Whole-package audit found invalid entries.
    #[error("package contains {} invalid files: {}", .invalid.len(), format_paths(.invalid))]
    AuditFailed {
        /// Package-relative paths of invalid entries.
        invalid: Vec<PathBuf>,
    },

    /// Source path does not exist or is not a directory.
    #[error("source directory not found: {path}")]
    SourceNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Build exceeded its wall-clock budget.
    #[error("package build timed out after {timeout:?}")]
    Timeout {
        /// The configured budget.
        timeout: Duration,
    },

    /// Build was cancelled through its token.
    #[error("package build cancelled")]
    Cancelled,

    /// The external archiver exited unsuccessfully.
    #[error("{tool} failed with exit code {}: {stderr}", format_code(.code))]
    ArchiverFailed {
        /// Archiver program name.
        tool: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured standard error, verbatim.
        stderr: String,
    },
}

fn format_issues(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nSpecific issues:");
    for err in errors {
        out.push_str("\n- ");
        out.push_str(err);
    }
    out
}

#[allow(clippy::ref_option)]
fn format_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl BuildError {
    /// Returns the category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use safedeb_core::BuildError;
    /// use safedeb_core::error::ErrorCategory;
    /// use std::path::PathBuf;
    ///
    /// let err = BuildError::NoRuleMatched {
    ///     path: PathBuf::from("/srv/data"),
    /// };
    /// assert_eq!(err.category(), ErrorCategory::TransformationFailure);
    /// ```
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyPath
            | Self::NotAbsolute { .. }
            | Self::PathTooLong { .. }
            | Self::ForbiddenPath { .. }
            | Self::DotDotSegment { .. }
            | Self::PathTraversal { .. }
            | Self::SymlinkForbiddenTarget { .. }
            | Self::SymlinkCycle { .. }
            | Self::MissingControlDir { .. }
            | Self::MissingControlFile { .. }
            | Self::AuditFailed { .. } => ErrorCategory::PolicyViolation,
            Self::ScriptRejected { .. } => ErrorCategory::RiskThresholdExceeded,
            Self::SymlinkTargetExists { .. }
            | Self::DuplicateSymlinkTarget { .. }
            | Self::Collision { .. }
            | Self::SymlinkFlushFailed { .. } => ErrorCategory::Collision,
            Self::NoRuleMatched { .. } => ErrorCategory::TransformationFailure,
            Self::Timeout { .. } | Self::Cancelled => ErrorCategory::Timeout,
            Self::ArchiverFailed { .. } => ErrorCategory::ExternalToolFailure,
            Self::Io(_) => ErrorCategory::Io,
            Self::InvalidScriptName { .. }
            | Self::InvalidPattern { .. }
            | Self::InvalidMetadata { .. }
            | Self::SourceNotFound { .. } => ErrorCategory::Usage,
        }
    }

    /// Returns `true` if this error represents a policy violation.
    ///
    /// Policy violations are never retried and always abort a build.
    ///
    /// # Examples
    ///
    /// ```
    /// use safedeb_core::BuildError;
    /// use std::path::PathBuf;
    ///
    /// let err = BuildError::ForbiddenPath {
    ///     path: PathBuf::from("/usr/bin/ls"),
    ///     rule: PathBuf::from("/usr/bin"),
    /// };
    /// assert!(err.is_policy_violation());
    /// assert!(!BuildError::Cancelled.is_policy_violation());
    /// ```
    #[must_use]
    pub const fn is_policy_violation(&self) -> bool {
        matches!(self.category(), ErrorCategory::PolicyViolation)
    }

    /// Returns `true` if the error came from the time budget or a cancel
    /// request rather than from the package contents.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.category(), ErrorCategory::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_path_display() {
        let err = BuildError::ForbiddenPath {
            path: PathBuf::from("/usr/bin/tool"),
            rule: PathBuf::from("/usr/bin"),
        };
        let msg = err.to_string();
        assert!(msg.contains("forbidden"));
        assert!(msg.contains("/usr/bin/tool"));
        assert!(err.is_policy_violation());
    }

    #[test]
    fn test_script_rejected_lists_issues() {
        let err = BuildError::ScriptRejected {
            script: "postinst".into(),
            assessment: "Risk Assessment: High (Score: 9/10)".into(),
            errors: vec!["Line 2: Command operates on protected path: /etc/passwd".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("postinst"));
        assert!(msg.contains("Specific issues:"));
        assert!(msg.contains("/etc/passwd"));
        assert_eq!(err.category(), ErrorCategory::RiskThresholdExceeded);
    }

    #[test]
    fn test_script_rejected_without_errors() {
        let err = BuildError::ScriptRejected {
            script: "prerm".into(),
            assessment: "Risk Assessment: High (Score: 8/10)".into(),
            errors: Vec::new(),
        };
        assert!(!err.to_string().contains("Specific issues"));
    }

    #[test]
    fn test_audit_failed_reports_count() {
        let err = BuildError::AuditFailed {
            invalid: vec![PathBuf::from("DEBIAN/evil"), PathBuf::from("usr/bin/x")],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 invalid files"));
        assert!(msg.contains("DEBIAN/evil"));
    }

    #[test]
    fn test_archiver_failed_without_code() {
        let err = BuildError::ArchiverFailed {
            tool: "dpkg-deb".into(),
            code: None,
            stderr: "killed".into(),
        };
        assert!(err.to_string().contains("exit code none"));
        assert_eq!(err.category(), ErrorCategory::ExternalToolFailure);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BuildError = io_err.into();
        assert!(matches!(err, BuildError::Io(_)));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_timeout_category() {
        let err = BuildError::Timeout {
            timeout: Duration::from_secs(5),
        };
        assert!(err.is_timeout());
        assert!(BuildError::Cancelled.is_timeout());
        assert!(!err.is_policy_violation());
    }
}
