//! Static risk analysis of lifecycle scripts.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::PathMapper;
use super::rules::DANGEROUS_COMMANDS;
use super::rules::DANGEROUS_PATTERNS;
use super::rules::PATH_TOKEN;
use super::rules::PATTERN_RISK;
use super::rules::PROTECTED_PATHS;
use super::rules::SHELL_INTERPRETERS;
use crate::BuildError;
use crate::Result;
use crate::ScriptPolicy;
use crate::SecurityLevel;

/// Highest score shown in a [`RiskAssessment`].
pub const REPORTED_RISK_CAP: u32 = 10;

/// Extra facts gathered while scanning a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptDetails {
    /// Protected paths referenced next to a dangerous command, in first-seen
    /// order without repeats.
    pub protected_paths: Vec<String>,
    /// Number of lines in the script.
    pub line_count: usize,
}

/// Outcome of [`ScriptValidator::validate`]. Never mutated after return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptValidationResult {
    /// Name the script was validated under.
    pub script: String,
    /// Whether the script passes the configured level.
    pub valid: bool,
    /// Advisory findings.
    pub warnings: Vec<String>,
    /// Findings that count against every level.
    pub errors: Vec<String>,
    /// Accumulated risk. Not capped; see [`RiskAssessment::score`].
    pub risk: u32,
    /// Additional details.
    pub details: ScriptDetails,
}

impl ScriptValidationResult {
    /// Summarizes the result for display.
    #[must_use]
    pub fn assessment(&self) -> RiskAssessment {
        RiskAssessment {
            band: RiskBand::from_score(self.risk),
            score: self.risk.min(REPORTED_RISK_CAP),
            warnings: self.warnings.len(),
            errors: self.errors.len(),
            valid: self.valid,
        }
    }

    /// Converts the result into a [`BuildError::ScriptRejected`].
    #[must_use]
    pub fn to_rejection(&self) -> BuildError {
        BuildError::ScriptRejected {
            script: self.script.clone(),
            assessment: self.assessment().to_string(),
            errors: self.errors.clone(),
        }
    }
}

/// Coarse risk band of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskBand {
    /// Score below 3.
    Low,
    /// Score 3 to 6.
    Medium,
    /// Score 7 and above.
    High,
}

impl RiskBand {
    /// Band for a raw score.
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            0..3 => Self::Low,
            3..7 => Self::Medium,
            _ => Self::High,
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        })
    }
}

/// Human-readable risk summary.
///
/// ```text
/// Risk Assessment: Medium (Score: 5/10)
/// Warnings: 3, Errors: 0
/// Valid: true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    /// Band of the raw score.
    pub band: RiskBand,
    /// Score capped at [`REPORTED_RISK_CAP`].
    pub score: u32,
    /// Warning count.
    pub warnings: usize,
    /// Error count.
    pub errors: usize,
    /// Verdict.
    pub valid: bool,
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Risk Assessment: {} (Score: {}/{REPORTED_RISK_CAP})\nWarnings: {}, Errors: {}\nValid: {}",
            self.band, self.score, self.warnings, self.errors, self.valid
        )
    }
}

#[derive(Debug, Clone)]
struct CommandRule {
    name: &'static str,
    base_risk: u32,
    matcher: Regex,
}

/// Scores lifecycle scripts for dangerous operations.
///
/// Each non-blank, non-comment line is tested against a catalogue of
/// dangerous patterns (+2 each) and dangerous commands (+base/3 each). A
/// dangerous command on a line that also mentions a protected path is an
/// error and adds base/2. Scores only ever grow while scanning.
///
/// # Examples
///
/// ```
/// use safedeb_core::{ScriptPolicy, SecurityLevel};
/// use safedeb_core::security::ScriptValidator;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let validator = ScriptValidator::new(&ScriptPolicy::default())?;
///
/// let ok = validator.validate("postinst", "#!/bin/sh\necho installed\n");
/// assert!(ok.valid);
///
/// let bad = validator.validate("postinst", "#!/bin/sh\nchmod 777 /etc/passwd\n");
/// assert!(!bad.valid);
/// assert_eq!(bad.details.protected_paths, vec!["/etc/passwd".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ScriptValidator {
    level: SecurityLevel,
    patterns: Vec<(String, Regex)>,
    commands: Vec<CommandRule>,
    path_token: Regex,
    mapper: Option<PathMapper>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| BuildError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Whether `line` names `path` or something below it as a whole path, so
/// `/sys` does not match inside `/etc/systemd` or `/opt/sys`.
fn mentions_path(line: &str, path: &str) -> bool {
    line.match_indices(path).any(|(start, _)| {
        let before = line[..start].chars().next_back();
        let after = line[start + path.len()..].chars().next();
        before.is_none_or(|c| !is_path_char(c) && !matches!(c, '/' | '$' | '}'))
            && after.is_none_or(|c| !is_path_char(c))
    })
}

impl ScriptValidator {
    /// Compiles the built-in catalogues plus the policy's extra patterns.
    ///
    /// # Errors
    ///
    /// [`BuildError::InvalidPattern`] when an extra pattern does not compile.
    pub fn new(policy: &ScriptPolicy) -> Result<Self> {
        let patterns = DANGEROUS_PATTERNS
            .iter()
            .copied()
            .chain(policy.extra_patterns.iter().map(String::as_str))
            .map(|p| Ok((p.to_string(), compile(p)?)))
            .collect::<Result<Vec<_>>>()?;

        let commands = DANGEROUS_COMMANDS
            .iter()
            .map(|&(name, base_risk)| {
                Ok(CommandRule {
                    name,
                    base_risk,
                    matcher: compile(&format!(r"\b{}\b", regex::escape(name)))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            level: policy.level,
            patterns,
            commands,
            path_token: compile(PATH_TOKEN)?,
            mapper: None,
        })
    }

    /// Enables path checks: absolute path tokens are run through `mapper`.
    #[must_use]
    pub fn with_mapper(mut self, mapper: PathMapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// The configured level.
    #[must_use]
    pub const fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Analyzes `content` and returns the verdict under the configured level.
    #[must_use]
    pub fn validate(&self, script_name: &str, content: &str) -> ScriptValidationResult {
        let mut result = ScriptValidationResult {
            script: script_name.to_string(),
            valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
            risk: 0,
            details: ScriptDetails {
                protected_paths: Vec::new(),
                line_count: content.lines().count(),
            },
        };

        if content.trim().is_empty() {
            result.warnings.push("Script content is empty".to_string());
            return result;
        }

        if !SHELL_INTERPRETERS.iter().any(|i| content.starts_with(i)) {
            result.warnings.push(
                "Script does not start with a valid shell interpreter line (shebang)".to_string(),
            );
        }

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.scan_line(index + 1, line, &mut result);
        }

        result.valid = self.verdict(&result);
        debug!(
            script = script_name,
            risk = result.risk,
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            valid = result.valid,
            "validated script"
        );
        result
    }

    fn scan_line(&self, number: usize, line: &str, result: &mut ScriptValidationResult) {
        for (source, pattern) in &self.patterns {
            if pattern.is_match(line) {
                result
                    .warnings
                    .push(format!("Line {number}: Potentially dangerous pattern: {source}"));
                result.risk = result.risk.saturating_add(PATTERN_RISK);
            }
        }

        for command in &self.commands {
            if !command.matcher.is_match(line) {
                continue;
            }
            result
                .warnings
                .push(format!("Line {number}: Potentially risky command: {}", command.name));
            result.risk = result.risk.saturating_add(command.base_risk / 3);

            for protected in PROTECTED_PATHS
                .iter()
                .filter(|p| mentions_path(line, p))
            {
                result.errors.push(format!(
                    "Line {number}: Command operates on protected path: {protected}"
                ));
                result.risk = result.risk.saturating_add(command.base_risk / 2);
                if !result.details.protected_paths.iter().any(|p| p == protected) {
                    result.details.protected_paths.push((*protected).to_string());
                }
            }
        }

        let Some(mapper) = &self.mapper else {
            return;
        };
        for token in self.path_token.captures_iter(line).filter_map(|c| c.get(1)) {
            let token = token.as_str();
            if token.contains('$') || token.contains('`') {
                continue;
            }
            match mapper.transform(Path::new(token)) {
                Err(_) => result
                    .warnings
                    .push(format!("Line {number}: Path cannot be transformed: {token}")),
                Ok(mapped) if mapped.needs_symlink => result
                    .warnings
                    .push(format!("Line {number}: Path would require symlink: {token}")),
                Ok(_) => {}
            }
        }
    }

    fn verdict(&self, result: &ScriptValidationResult) -> bool {
        let errors = result.errors.len();
        let warnings = result.warnings.len();
        let risk = result.risk;
        match self.level {
            SecurityLevel::Low => errors <= 3 && risk <= 8,
            SecurityLevel::Medium => errors == 0 && risk <= 6,
            SecurityLevel::High => errors == 0 && warnings <= 3 && risk <= 4,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn validator(level: SecurityLevel) -> ScriptValidator {
        ScriptValidator::new(&ScriptPolicy::default().with_level(level)).unwrap()
    }

    #[test]
    fn test_empty_script_valid_with_warning() {
        for level in [SecurityLevel::Low, SecurityLevel::Medium, SecurityLevel::High] {
            let result = validator(level).validate("postinst", "  \n\n");
            assert!(result.valid);
            assert_eq!(result.warnings, vec!["Script content is empty".to_string()]);
            assert_eq!(result.risk, 0);
        }
    }

    #[test]
    fn test_missing_shebang_is_warning() {
        let result = validator(SecurityLevel::Medium).validate("preinst", "echo hi\n");
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("shebang"));
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let script = "#!/bin/sh\n# rm -rf /\n\n   # sudo reboot\necho done\n";
        let result = validator(SecurityLevel::High).validate("postrm", script);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
        assert_eq!(result.details.line_count, 5);
    }

    #[test]
    fn test_dangerous_script_rejected_at_medium() {
        let script = "#!/bin/sh\nrm -rf /etc/important\nchmod 777 /etc/passwd\n";
        let result = validator(SecurityLevel::Medium).validate("postinst", script);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("/etc/passwd"));
        // rm: pattern 2 + command 2; chmod: pattern 2 + command 2 + protected 3
        assert_eq!(result.risk, 11);
        assert_eq!(result.assessment().score, 10);
        assert_eq!(result.assessment().band, RiskBand::High);
    }

    #[test]
    fn test_variable_paths_accepted() {
        let validator = validator(SecurityLevel::Medium).with_mapper(PathMapper::default());
        let script = "#!/bin/sh\nAPP_DIR=/opt/myapp; mkdir -p $APP_DIR/logs\n";
        let result = validator.validate("postinst", script);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
        assert_eq!(result.risk, 0);
    }

    #[test]
    fn test_mapper_path_findings() {
        let validator = validator(SecurityLevel::Low).with_mapper(PathMapper::default());
        let script = "#!/bin/sh\ncp app.service /etc/systemd/system/app.service\ntouch /srv/data\n";
        let result = validator.validate("postinst", script);
        assert!(result.warnings.iter().any(|w| w.contains("would require symlink")));
        assert!(result.warnings.iter().any(|w| w.contains("cannot be transformed: /srv/data")));
        assert!(result.valid);
    }

    #[test]
    fn test_etc_append_counts_both_redirect_patterns() {
        let script = "#!/bin/sh\necho 'x' >> /etc/passwd\n";
        let result = validator(SecurityLevel::Medium).validate("postinst", script);
        assert_eq!(result.risk, 4);
        assert!(result.errors.is_empty());
        assert!(result.valid);
        assert!(validator(SecurityLevel::High).validate("postinst", script).valid);
    }

    #[test]
    fn test_level_thresholds() {
        // sudo: pattern 2 + command 3 = 5
        let script = "#!/bin/sh\nsudo true\n";
        assert!(validator(SecurityLevel::Low).validate("p", script).valid);
        assert!(validator(SecurityLevel::Medium).validate("p", script).valid);
        assert!(!validator(SecurityLevel::High).validate("p", script).valid);
    }

    #[test]
    fn test_warning_count_limit_at_high() {
        let script = "echo a\n";
        // one warning (shebang) is fine at High
        assert!(validator(SecurityLevel::High).validate("p", script).valid);
        let noisy = "wget -q file\ncurl -s file\n";
        let result = validator(SecurityLevel::High).validate("p", noisy);
        // shebang + wget + curl = 3 warnings, risk 2
        assert_eq!(result.warnings.len(), 3);
        assert!(result.valid);
        let result = validator(SecurityLevel::High).validate("p", "wget a\ncurl b\numount x\n");
        assert_eq!(result.warnings.len(), 4);
        assert!(!result.valid);
    }

    #[test]
    fn test_extra_patterns() {
        let policy = ScriptPolicy::default().with_extra_pattern(r"nc\s+-l");
        let validator = ScriptValidator::new(&policy).unwrap();
        let result = validator.validate("p", "#!/bin/sh\nnc -l 4444\n");
        assert_eq!(result.risk, 2);

        let bad = ScriptPolicy::default().with_extra_pattern("(unclosed");
        assert!(matches!(
            ScriptValidator::new(&bad),
            Err(BuildError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_assessment_display() {
        let result = validator(SecurityLevel::Medium).validate("p", "#!/bin/sh\nsudo true\n");
        let text = result.assessment().to_string();
        assert_eq!(text, "Risk Assessment: Medium (Score: 5/10)\nWarnings: 2, Errors: 0\nValid: true");
    }

    #[test]
    fn test_rejection_error() {
        let result =
            validator(SecurityLevel::Medium).validate("postinst", "#!/bin/sh\nrm -rf /bin/ls\n");
        assert!(!result.valid);
        let err = result.to_rejection();
        assert!(matches!(err, BuildError::ScriptRejected { .. }));
        assert!(err.to_string().contains("Specific issues"));
    }

    #[test]
    fn test_protected_paths_match_whole_components() {
        assert!(mentions_path("chmod 777 /etc/passwd", "/etc/passwd"));
        assert!(mentions_path("rm -f '/bin/sh'", "/bin"));
        assert!(!mentions_path("rm -f /etc/systemd/system/app.service", "/sys"));
        assert!(!mentions_path("chmod 755 /opt/usr/bin/app", "/usr/bin"));
        assert!(!mentions_path("rm -rf $PREFIX/bin", "/bin"));
        assert!(!mentions_path("rm /etc/passwd.bak", "/etc/passwd"));
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(RiskBand::from_score(0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(2), RiskBand::Low);
        assert_eq!(RiskBand::from_score(3), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(6), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(7), RiskBand::High);
    }
}
