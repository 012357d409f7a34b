//! Map command implementation.

use crate::cli::MapArgs;
use crate::output::OutputFormatter;
use anyhow::Result;
use anyhow::bail;
use safedeb_core::BuilderConfig;
use safedeb_core::security::PathMapper;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of transforming one path.
#[derive(Debug, Serialize)]
pub struct MapEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed: Option<PathBuf>,
    pub needs_symlink: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn execute(args: &MapArgs, config: &BuilderConfig, formatter: &dyn OutputFormatter) -> Result<()> {
    let mapper = PathMapper::new(&config.mapper);
    let entries: Vec<MapEntry> = args
        .paths
        .iter()
        .map(|path| match mapper.transform(path) {
            Ok(mapped) => MapEntry {
                path: path.clone(),
                transformed: Some(mapped.path),
                needs_symlink: mapped.needs_symlink,
                error: None,
            },
            Err(err) => MapEntry {
                path: path.clone(),
                transformed: None,
                needs_symlink: false,
                error: Some(err.to_string()),
            },
        })
        .collect();

    formatter.format_mappings(&entries)?;

    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    if failed > 0 {
        bail!("{failed} of {} paths could not be mapped", entries.len());
    }
    Ok(())
}
