//! Output formatter trait for CLI results.

use crate::commands::map::MapEntry;
use crate::commands::symlink::LinkEntry;
use crate::commands::symlink::SymlinkInspection;
use anyhow::Result;
use safedeb_core::BuildReport;
use safedeb_core::security::ScriptValidationResult;
use safedeb_core::symlink::SymlinkRequest;
use serde::Serialize;
use std::path::Path;

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format build result
    fn format_build_result(&self, report: &BuildReport) -> Result<()>;

    /// Format script analysis
    fn format_script_result(&self, file: &Path, result: &ScriptValidationResult) -> Result<()>;

    /// Format path mappings
    fn format_mappings(&self, entries: &[MapEntry]) -> Result<()>;

    /// Format a created (or planned) symlink
    fn format_symlink_created(&self, request: &SymlinkRequest, dry_run: bool) -> Result<()>;

    /// Format findings for an existing symlink
    fn format_symlink_inspection(&self, inspection: &SymlinkInspection) -> Result<()>;

    /// Format discovered symlinks
    fn format_symlink_list(&self, entries: &[LinkEntry]) -> Result<()>;

    /// Format warning message
    fn format_warning(&self, message: &str);
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }

    /// Result that carries data but did not pass, such as a rejected script.
    pub fn failure(operation: impl Into<String>, data: T, error: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Error,
            data: Some(data),
            error: Some(error.into()),
        }
    }
}
