//! Safedeb CLI - builds Debian packages whose files install under an
//! isolated root, with symlinks back to the conventional locations.

mod cli;
mod commands;
mod config;
mod error;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let file = config::ConfigFile::load(cli.config.as_deref())?;
    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);

    match &cli.command {
        cli::Commands::Build(args) => commands::build::execute(args, file, &*formatter),
        cli::Commands::Symlink(command) => {
            commands::symlink::execute(command, &file.build, &*formatter)
        }
        cli::Commands::Script(cli::ScriptCommands::Check(args)) => {
            commands::script::execute(args, &file.build, &*formatter)
        }
        cli::Commands::Map(args) => commands::map::execute(args, &file.build, &*formatter),
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the flag-derived filter.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "warn,safedeb_core=debug,safedeb=debug"
    } else if quiet {
        "error"
    } else {
        "error,safedeb_core=warn,safedeb=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
