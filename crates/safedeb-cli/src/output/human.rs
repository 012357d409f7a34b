//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use crate::commands::map::MapEntry;
use crate::commands::symlink::LinkEntry;
use crate::commands::symlink::SymlinkInspection;
use anyhow::Result;
use console::Term;
use console::style;
use safedeb_core::BuildReport;
use safedeb_core::security::RiskBand;
use safedeb_core::security::ScriptValidationResult;
use safedeb_core::symlink::SymlinkRequest;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn header(&self, mark: &str, text: &str) {
        if self.use_colors {
            self.line(&format!("{} {text}", style(mark).green().bold()));
        } else {
            self.line(text);
        }
    }

    fn band_label(&self, band: RiskBand) -> String {
        if !self.use_colors {
            return band.to_string();
        }
        match band {
            RiskBand::Low => style(band).green().to_string(),
            RiskBand::Medium => style(band).yellow().to_string(),
            RiskBand::High => style(band).red().bold().to_string(),
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_build_result(&self, report: &BuildReport) -> Result<()> {
        if !self.quiet {
            self.header(
                "✓",
                &format!("Package built: {}", report.output_path.display()),
            );
            self.line(&format!("  Files:              {}", report.files_copied));
            self.line(&format!(
                "  Directories:        {}",
                report.directories_created
            ));
            self.line(&format!(
                "  Symlinks in tree:   {}",
                report.symlinks_recreated
            ));
            self.line(&format!(
                "  Deferred symlinks:  {}",
                report.deferred_symlinks.len()
            ));
            self.line(&format!(
                "  Installed size:     {} KB",
                report.installed_size_kb
            ));

            if self.verbose {
                self.line(&format!(
                    "  Bytes copied:       {}",
                    Self::format_size(report.bytes_copied)
                ));
                self.line(&format!("  Duration:           {:?}", report.duration));
                for link in &report.deferred_symlinks {
                    self.line(&format!(
                        "    {} -> {}",
                        link.target.display(),
                        link.source.display()
                    ));
                }
            }
        }

        // Forced-through scripts are shown even in quiet mode.
        if report.has_warnings() {
            self.line("");
            if self.use_colors {
                self.line(&format!("{}", style("Warnings:").yellow().bold()));
            } else {
                self.line("Warnings:");
            }
            for warning in &report.warnings {
                self.line(&format!("  - {warning}"));
            }
        }

        Ok(())
    }

    fn format_script_result(&self, file: &Path, result: &ScriptValidationResult) -> Result<()> {
        if self.quiet && result.valid {
            return Ok(());
        }

        let assessment = result.assessment();
        self.line(&format!("Script: {}", file.display()));
        self.line(&format!(
            "  Risk: {} (Score: {}/10)",
            self.band_label(assessment.band),
            assessment.score
        ));
        self.line(&format!(
            "  Warnings: {}, Errors: {}",
            assessment.warnings, assessment.errors
        ));
        self.line(&format!("  Valid: {}", assessment.valid));

        if !result.errors.is_empty() {
            self.line("");
            self.line("Errors:");
            for error in &result.errors {
                self.line(&format!("  - {error}"));
            }
        }

        if !result.warnings.is_empty() && (self.verbose || !result.valid) {
            self.line("");
            self.line("Warnings:");
            for warning in &result.warnings {
                self.line(&format!("  - {warning}"));
            }
        }

        if self.verbose && !result.details.protected_paths.is_empty() {
            self.line("");
            self.line(&format!(
                "Protected paths: {}",
                result.details.protected_paths.join(", ")
            ));
        }

        Ok(())
    }

    fn format_mappings(&self, entries: &[MapEntry]) -> Result<()> {
        for entry in entries {
            match (&entry.transformed, &entry.error) {
                (Some(mapped), _) => {
                    if self.quiet {
                        continue;
                    }
                    let suffix = if entry.needs_symlink { " (symlink)" } else { "" };
                    self.line(&format!(
                        "{} -> {}{suffix}",
                        entry.path.display(),
                        mapped.display()
                    ));
                }
                (None, error) => {
                    let reason = error.as_deref().unwrap_or("no mapping");
                    if self.use_colors {
                        self.line(&format!(
                            "{} {}: {reason}",
                            style("✗").red().bold(),
                            entry.path.display()
                        ));
                    } else {
                        self.line(&format!("{}: {reason}", entry.path.display()));
                    }
                }
            }
        }
        Ok(())
    }

    fn format_symlink_created(&self, request: &SymlinkRequest, dry_run: bool) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let verb = if dry_run {
            "Would create symlink"
        } else {
            "Created symlink"
        };
        self.header(
            "✓",
            &format!(
                "{verb}: {} -> {}",
                request.target.display(),
                request.source.display()
            ),
        );
        if self.verbose && !request.description.is_empty() {
            self.line(&format!("  {}", request.description));
        }
        Ok(())
    }

    fn format_symlink_inspection(&self, inspection: &SymlinkInspection) -> Result<()> {
        if self.quiet && inspection.issues.is_empty() {
            return Ok(());
        }

        self.line(&format!(
            "{} -> {}",
            inspection.target.display(),
            inspection.source.display()
        ));
        if inspection.issues.is_empty() {
            self.header("✓", "  No issues found");
            return Ok(());
        }
        for issue in &inspection.issues {
            if self.use_colors {
                self.line(&format!("  {} {issue}", style("⚠").yellow().bold()));
            } else {
                self.line(&format!("  WARNING: {issue}"));
            }
        }
        Ok(())
    }

    fn format_symlink_list(&self, entries: &[LinkEntry]) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if entries.is_empty() {
            self.line("No managed symlinks found");
            return Ok(());
        }
        for entry in entries {
            let marker = if entry.points_into_secure_root { "" } else { " (external)" };
            self.line(&format!(
                "{} -> {}{marker}",
                entry.target.display(),
                entry.source.display()
            ));
        }
        if self.verbose {
            self.line("");
            self.line(&format!("Total: {} symlinks", entries.len()));
        }
        Ok(())
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let err = Term::stderr();
        if self.use_colors {
            let _ = err.write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = err.write_line(&format!("WARNING: {message}"));
        }
    }
}
