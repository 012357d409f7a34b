//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use safedeb_core::SecurityLevel;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "safedeb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// TOML file with [package] metadata and [build] settings
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a Debian package from a source tree
    Build(Box<BuildArgs>),
    /// Create, inspect and list deferred symlinks
    #[command(subcommand)]
    Symlink(SymlinkCommands),
    /// Analyze maintainer scripts
    #[command(subcommand)]
    Script(ScriptCommands),
    /// Show where system paths are relocated
    Map(MapArgs),
}

#[derive(clap::Args)]
pub struct BuildArgs {
    /// Package name
    #[arg(long)]
    pub name: Option<String>,

    /// Package version
    #[arg(long)]
    pub version: Option<String>,

    /// Maintainer, as "Name <email>"
    #[arg(long)]
    pub maintainer: Option<String>,

    /// Package description (default: package name)
    #[arg(long)]
    pub description: Option<String>,

    /// Package architecture (default: host architecture)
    #[arg(long = "arch")]
    pub architecture: Option<String>,

    /// Package section
    #[arg(long)]
    pub section: Option<String>,

    /// Package priority
    #[arg(long)]
    pub priority: Option<String>,

    /// Dependencies (comma-separated, can be repeated)
    #[arg(long, value_delimiter = ',')]
    pub depends: Vec<String>,

    /// Conflicting packages (comma-separated, can be repeated)
    #[arg(long, value_delimiter = ',')]
    pub conflicts: Vec<String>,

    /// Provided virtual packages (comma-separated, can be repeated)
    #[arg(long, value_delimiter = ',')]
    pub provides: Vec<String>,

    /// Project homepage
    #[arg(long)]
    pub homepage: Option<String>,

    /// Source directory laid out like the target filesystem
    #[arg(long, default_value = ".")]
    pub source: PathBuf,

    /// Output directory for the .deb file
    #[arg(long, default_value = ".")]
    pub output: PathBuf,

    /// Keep source file permissions
    #[arg(long)]
    pub preserve_perms: bool,

    /// Directory to skip, relative to the source (can be repeated)
    #[arg(long = "exclude", value_name = "DIR")]
    pub exclude: Vec<PathBuf>,

    /// Maintainer script; the slot is taken from the file name (can be repeated)
    #[arg(long = "script", value_name = "FILE")]
    pub scripts: Vec<PathBuf>,

    /// Do not defer symlinks to conventional locations
    #[arg(long)]
    pub disable_symlinks: bool,

    /// Abort on symlink failures and validate scripts at the high level
    #[arg(long)]
    pub strict: bool,

    /// Accept maintainer scripts that fail validation (not recommended)
    #[arg(long)]
    pub ignore_script_validation: bool,

    /// Build timeout in seconds (default: 600)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Archiver program used instead of dpkg-deb
    #[arg(long, value_name = "PROGRAM")]
    pub archiver: Option<String>,
}

#[derive(Subcommand)]
pub enum SymlinkCommands {
    /// Validate and create a single symlink
    Create(SymlinkCreateArgs),
    /// Inspect an existing symlink
    Validate(SymlinkValidateArgs),
    /// List symlinks in the symlink-required directories
    List(SymlinkListArgs),
}

#[derive(clap::Args)]
pub struct SymlinkCreateArgs {
    /// Path the link points to
    #[arg(long)]
    pub source: PathBuf,

    /// Location of the link
    #[arg(long)]
    pub target: PathBuf,

    /// Note attached to the request
    #[arg(long)]
    pub description: Option<String>,

    /// Only report what would be created
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct SymlinkValidateArgs {
    /// Path of the symlink to inspect
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Fail on any finding, not only on traversal violations
    #[arg(long)]
    pub strict: bool,
}

#[derive(clap::Args)]
pub struct SymlinkListArgs {
    /// Directory the symlink-required directories are resolved under
    #[arg(long, default_value = "/", value_name = "DIR")]
    pub prefix: PathBuf,

    /// Include links that do not point into the secure root
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Subcommand)]
pub enum ScriptCommands {
    /// Score a maintainer script and report its findings
    Check(ScriptCheckArgs),
}

#[derive(clap::Args)]
pub struct ScriptCheckArgs {
    /// Script file to analyze
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Security level (low, medium, high)
    #[arg(short, long)]
    pub level: Option<SecurityLevel>,
}

#[derive(clap::Args)]
pub struct MapArgs {
    /// Absolute system paths to transform
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,
}
