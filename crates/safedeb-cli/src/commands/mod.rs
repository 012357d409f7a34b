//! Subcommand implementations.

pub mod build;
pub mod map;
pub mod script;
pub mod symlink;
