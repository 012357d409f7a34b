//! Configuration file loading.
//!
//! ```toml
//! [package]
//! name = "hello"
//! version = "1.0.0"
//! maintainer = "Jane Doe <jane@example.com>"
//!
//! [build.mapper]
//! secure_root = "/opt/hello"
//!
//! [build.options]
//! exclude_dirs = [".git"]
//! ```

use anyhow::Context;
use anyhow::Result;
use safedeb_core::BuilderConfig;
use safedeb_core::PackageMetadata;
use safedeb_core::config::DEFAULT_SECURE_ROOT;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Contents of a `--config` file. Both tables are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Package metadata; command-line flags override individual fields.
    pub package: Option<PackageMetadata>,
    /// Mapper, policy and build settings.
    pub build: BuilderConfig,
}

impl ConfigFile {
    /// Reads `path`, or returns the defaults when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let file = Self::parse(&text)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            secure_root = %file.build.mapper.secure_root.display(),
            "loaded config file"
        );
        Ok(file)
    }

    fn parse(text: &str) -> Result<Self> {
        let mut file: Self = toml::from_str(text)?;
        // Rules left at their defaults still point below /opt; move them
        // under a configured secure root and keep the validator in step.
        let mut mapper = std::mem::take(&mut file.build.mapper);
        let root = std::mem::replace(&mut mapper.secure_root, PathBuf::from(DEFAULT_SECURE_ROOT));
        file.build = file.build.with_mapper(mapper.with_secure_root(root));
        Ok(file)
    }
}
