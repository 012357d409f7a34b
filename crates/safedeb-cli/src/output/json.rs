//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use crate::commands::map::MapEntry;
use crate::commands::symlink::LinkEntry;
use crate::commands::symlink::SymlinkInspection;
use anyhow::Result;
use safedeb_core::BuildReport;
use safedeb_core::security::RiskAssessment;
use safedeb_core::security::ScriptValidationResult;
use safedeb_core::symlink::SymlinkRequest;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter;

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_build_result(&self, report: &BuildReport) -> Result<()> {
        Self::output(&JsonOutput::success("build", report))
    }

    fn format_script_result(&self, file: &Path, result: &ScriptValidationResult) -> Result<()> {
        #[derive(Serialize)]
        struct ScriptOutput<'a> {
            file: String,
            assessment: RiskAssessment,
            #[serde(flatten)]
            result: &'a ScriptValidationResult,
        }

        let data = ScriptOutput {
            file: file.display().to_string(),
            assessment: result.assessment(),
            result,
        };
        if result.valid {
            Self::output(&JsonOutput::success("script-check", data))
        } else {
            Self::output(&JsonOutput::failure("script-check", data, "script rejected"))
        }
    }

    fn format_mappings(&self, entries: &[MapEntry]) -> Result<()> {
        Self::output(&JsonOutput::success("map", entries))
    }

    fn format_symlink_created(&self, request: &SymlinkRequest, dry_run: bool) -> Result<()> {
        #[derive(Serialize)]
        struct CreatedOutput<'a> {
            #[serde(flatten)]
            request: &'a SymlinkRequest,
            dry_run: bool,
        }

        Self::output(&JsonOutput::success(
            "symlink-create",
            CreatedOutput { request, dry_run },
        ))
    }

    fn format_symlink_inspection(&self, inspection: &SymlinkInspection) -> Result<()> {
        Self::output(&JsonOutput::success("symlink-validate", inspection))
    }

    fn format_symlink_list(&self, entries: &[LinkEntry]) -> Result<()> {
        Self::output(&JsonOutput::success("symlink-list", entries))
    }

    fn format_warning(&self, message: &str) {
        // Warnings go to stderr so stdout stays one JSON document.
        let _ = writeln!(io::stderr(), "warning: {message}");
    }
}
