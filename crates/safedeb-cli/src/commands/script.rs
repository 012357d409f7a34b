//! Script check command implementation.

use crate::cli::ScriptCheckArgs;
use crate::error::SCRIPT_BYPASS_HINT;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use safedeb_core::BuilderConfig;
use safedeb_core::security::PathMapper;
use safedeb_core::security::ScriptValidator;
use std::fs;

pub fn execute(
    args: &ScriptCheckArgs,
    config: &BuilderConfig,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read script '{}'", args.file.display()))?;

    let mut policy = config.effective_script_policy();
    if let Some(level) = args.level {
        policy.level = level;
    }
    let validator = ScriptValidator::new(&policy)?.with_mapper(PathMapper::new(&config.mapper));

    let name = args
        .file
        .file_name()
        .map_or_else(|| args.file.display().to_string(), |n| n.to_string_lossy().into_owned());
    let result = validator.validate(&name, &content);
    formatter.format_script_result(&args.file, &result)?;

    if !result.valid {
        bail!(
            "script '{}' rejected at {} security level\nHINT: {SCRIPT_BYPASS_HINT} when building",
            args.file.display(),
            policy.level
        );
    }
    Ok(())
}
