//! Error conversion utilities for CLI.
//!
//! Converts safedeb-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use safedeb_core::BuildError;

/// Shown whenever a maintainer script is rejected.
pub const SCRIPT_BYPASS_HINT: &str =
    "To bypass script validation, use the --ignore-script-validation flag (not recommended)";

/// Converts `BuildError` to a user-friendly anyhow error with a hint.
pub fn convert_build_error(err: BuildError) -> anyhow::Error {
    match err {
        BuildError::ScriptRejected { .. } => {
            anyhow!("{err}\nHINT: {SCRIPT_BYPASS_HINT}")
        }
        BuildError::NoRuleMatched { path } => {
            anyhow!(
                "No mapping rule covers '{}'\n\
                 HINT: Move the file below a mapped directory (/etc, /usr, /var, ...) or add a \
                 rule to [build.mapper] in the config file.",
                path.display()
            )
        }
        BuildError::ForbiddenPath { .. }
        | BuildError::PathTraversal { .. }
        | BuildError::DotDotSegment { .. } => {
            anyhow!(
                "Security violation: {err}\n\
                 HINT: The source tree contains a path the security policy never allows."
            )
        }
        BuildError::AuditFailed { .. }
        | BuildError::MissingControlDir { .. }
        | BuildError::MissingControlFile { .. } => {
            anyhow!("Package audit failed: {err}")
        }
        BuildError::Timeout { .. } => {
            anyhow!("{err}\nHINT: Use --timeout to allow more time for large packages.")
        }
        BuildError::ArchiverFailed { .. } => {
            anyhow!("{err}\nHINT: The archiver's output above describes the failure.")
        }
        BuildError::SymlinkTargetExists { .. } | BuildError::Collision { .. } => {
            anyhow!("{err}\nHINT: Remove the existing entry or choose another target.")
        }
        BuildError::SourceNotFound { .. } => {
            anyhow!("{err}\nHINT: Use --source to point at the package root.")
        }
        BuildError::Io(io_err) => anyhow!("I/O error: {io_err}"),
        _ => anyhow::Error::from(err),
    }
}

/// Converts the error of `result` with [`convert_build_error`].
pub fn add_build_context<T>(result: Result<T, BuildError>) -> anyhow::Result<T> {
    result.map_err(convert_build_error)
}
