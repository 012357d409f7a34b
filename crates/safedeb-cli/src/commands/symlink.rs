//! Symlink command implementations.

use crate::cli::SymlinkCommands;
use crate::cli::SymlinkCreateArgs;
use crate::cli::SymlinkListArgs;
use crate::cli::SymlinkValidateArgs;
use crate::error::add_build_context;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use safedeb_core::BuilderConfig;
use safedeb_core::security::PathMapper;
use safedeb_core::security::PathValidator;
use safedeb_core::symlink::AUTO_DESCRIPTION;
use safedeb_core::symlink::SymlinkManager;
use safedeb_core::symlink::SymlinkProcessor;
use safedeb_core::symlink::SymlinkRequest;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Findings for one existing link.
#[derive(Debug, Serialize)]
pub struct SymlinkInspection {
    pub target: PathBuf,
    pub source: PathBuf,
    pub points_into_secure_root: bool,
    pub source_exists: bool,
    pub issues: Vec<String>,
}

/// A link found by `symlink list`.
#[derive(Debug, Serialize)]
pub struct LinkEntry {
    pub target: PathBuf,
    pub source: PathBuf,
    pub points_into_secure_root: bool,
}

pub fn execute(
    command: &SymlinkCommands,
    config: &BuilderConfig,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    match command {
        SymlinkCommands::Create(args) => create(args, config, formatter),
        SymlinkCommands::Validate(args) => validate(args, config, formatter),
        SymlinkCommands::List(args) => list(args, config, formatter),
    }
}

fn create(args: &SymlinkCreateArgs, config: &BuilderConfig, formatter: &dyn OutputFormatter) -> Result<()> {
    let mut processor = SymlinkProcessor::new(
        PathMapper::new(&config.mapper),
        SymlinkManager::new(config.mapper.symlink_dirs.clone()),
        PathValidator::new(config.security.clone()),
    );
    processor.set_dry_run(args.dry_run);

    let request = SymlinkRequest::new(
        &args.source,
        &args.target,
        args.description.as_deref().unwrap_or(AUTO_DESCRIPTION),
    );
    add_build_context(processor.queue(request.clone()))?;
    add_build_context(processor.flush())?;

    formatter.format_symlink_created(&request, args.dry_run)?;
    Ok(())
}

fn validate(
    args: &SymlinkValidateArgs,
    config: &BuilderConfig,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let metadata = fs::symlink_metadata(&args.target)
        .with_context(|| format!("cannot inspect '{}'", args.target.display()))?;
    if !metadata.file_type().is_symlink() {
        bail!("'{}' is not a symlink", args.target.display());
    }
    let source = fs::read_link(&args.target)
        .with_context(|| format!("cannot read link '{}'", args.target.display()))?;

    let mapper = PathMapper::new(&config.mapper);
    let validator = PathValidator::new(config.security.clone());
    let mut issues = Vec::new();
    let mut violation = false;

    for path in [&source, &args.target] {
        if let Err(err) = validator.validate_path_traversal(path) {
            issues.push(err.to_string());
            violation = true;
        }
    }
    let points_into_secure_root = mapper.is_transformed(&source);
    if !points_into_secure_root {
        issues.push(format!(
            "link points outside the secure root {}",
            mapper.secure_root().display()
        ));
    }
    // Follows the link, so a dangling link reports false.
    let source_exists = fs::metadata(&args.target).is_ok();
    if !source_exists {
        issues.push(format!("link source {} does not exist", source.display()));
    }

    let inspection = SymlinkInspection {
        target: args.target.clone(),
        source,
        points_into_secure_root,
        source_exists,
        issues,
    };
    formatter.format_symlink_inspection(&inspection)?;

    if violation {
        bail!("symlink '{}' failed the traversal check", args.target.display());
    }
    if args.strict && !inspection.issues.is_empty() {
        bail!(
            "symlink '{}' has {} issue(s)",
            args.target.display(),
            inspection.issues.len()
        );
    }
    Ok(())
}

fn list(args: &SymlinkListArgs, config: &BuilderConfig, formatter: &dyn OutputFormatter) -> Result<()> {
    let mapper = PathMapper::new(&config.mapper);
    let mut entries = Vec::new();

    for dir in mapper.symlink_dirs().dirs() {
        let root = args.prefix.join(dir.strip_prefix("/").unwrap_or(dir));
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name() {
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.path_is_symlink() {
                continue;
            }
            let Ok(source) = fs::read_link(entry.path()) else {
                continue;
            };
            let points_into_secure_root = mapper.is_transformed(&source);
            if points_into_secure_root || args.all {
                entries.push(LinkEntry {
                    target: install_path(&args.prefix, entry.path()),
                    source,
                    points_into_secure_root,
                });
            }
        }
    }

    // Nested symlink directories are visited once per configured parent.
    entries.sort_by(|a, b| a.target.cmp(&b.target));
    entries.dedup_by(|a, b| a.target == b.target);
    formatter.format_symlink_list(&entries)?;
    Ok(())
}

/// Path of `found` as seen from inside `prefix`.
fn install_path(prefix: &Path, found: &Path) -> PathBuf {
    found
        .strip_prefix(prefix)
        .map_or_else(|_| found.to_path_buf(), |rest| Path::new("/").join(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_path() {
        assert_eq!(
            install_path(Path::new("/tmp/root"), Path::new("/tmp/root/usr/bin/app")),
            Path::new("/usr/bin/app")
        );
        assert_eq!(
            install_path(Path::new("/"), Path::new("/usr/bin/app")),
            Path::new("/usr/bin/app")
        );
    }
}
