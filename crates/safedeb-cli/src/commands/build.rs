//! Build command implementation.

use crate::cli::BuildArgs;
use crate::config::ConfigFile;
use crate::error::add_build_context;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use safedeb_core::Builder;
use safedeb_core::BuilderConfig;
use safedeb_core::DpkgDeb;
use safedeb_core::MaintainerScript;
use safedeb_core::PackageMetadata;
use std::fs;

pub fn execute(args: &BuildArgs, file: ConfigFile, formatter: &dyn OutputFormatter) -> Result<()> {
    let metadata = package_metadata(args, file.package.unwrap_or_default())?;
    let config = builder_config(args, file.build);
    let timeout = config.options.timeout();
    let ignore_validation = config.options.ignore_script_validation;

    let mut builder = add_build_context(Builder::new(
        &args.source,
        &args.output,
        metadata,
        config,
    ))?;
    if let Some(program) = &args.archiver {
        builder = builder.with_archiver(DpkgDeb::new(program.clone()));
    }

    for path in &args.scripts {
        let slot = MaintainerScript::from_file_name(path).ok_or_else(|| {
            anyhow!(
                "cannot tell the script slot of '{}'\n\
                 HINT: Name the file preinst, postinst, prerm or postrm (an extension is allowed).",
                path.display()
            )
        })?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read script '{}'", path.display()))?;
        let result = add_build_context(builder.set_maintainer_script(slot, content))?;
        if !result.valid && ignore_validation {
            formatter.format_warning(&format!(
                "Script validation failed for {slot} but continuing due to \
                 --ignore-script-validation flag\n{}",
                result.assessment()
            ));
        }
    }

    let report = add_build_context(builder.build_with_timeout(timeout))?;
    formatter.format_build_result(&report)?;
    Ok(())
}

/// Starts from the config file's `[package]` table and applies the flags.
fn package_metadata(args: &BuildArgs, mut metadata: PackageMetadata) -> Result<PackageMetadata> {
    let overrides = [
        (&args.name, &mut metadata.name),
        (&args.version, &mut metadata.version),
        (&args.maintainer, &mut metadata.maintainer),
        (&args.description, &mut metadata.description),
        (&args.architecture, &mut metadata.architecture),
        (&args.section, &mut metadata.section),
        (&args.priority, &mut metadata.priority),
        (&args.homepage, &mut metadata.homepage),
    ];
    for (flag, field) in overrides {
        if let Some(value) = flag {
            field.clone_from(value);
        }
    }
    let lists = [
        (&args.depends, &mut metadata.depends),
        (&args.conflicts, &mut metadata.conflicts),
        (&args.provides, &mut metadata.provides),
    ];
    for (flag, field) in lists {
        if !flag.is_empty() {
            field.clone_from(flag);
        }
    }

    for (flag, value) in [
        ("--name", &metadata.name),
        ("--version", &metadata.version),
        ("--maintainer", &metadata.maintainer),
    ] {
        if value.trim().is_empty() {
            bail!("{flag} is required (or set it in the [package] table of --config)");
        }
    }
    Ok(metadata)
}

fn builder_config(args: &BuildArgs, config: BuilderConfig) -> BuilderConfig {
    let mut options = config.options.clone();
    options.preserve_permissions |= args.preserve_perms;
    options.strict |= args.strict;
    options.disable_symlinks |= args.disable_symlinks;
    options.ignore_script_validation |= args.ignore_script_validation;
    options.exclude_dirs.extend(args.exclude.iter().cloned());
    if let Some(secs) = args.timeout {
        options.timeout_secs = secs;
    }
    config.with_options(options)
}
