//! Build outcome reporting.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::package::MaintainerScript;
use crate::symlink::SymlinkRequest;

/// Statistics and findings of a successful build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Path of the produced package.
    pub output_path: PathBuf,

    /// Regular files copied into the staging tree.
    pub files_copied: usize,

    /// Directories created in the staging tree.
    pub directories_created: usize,

    /// Symlinks from the source tree recreated in staging.
    pub symlinks_recreated: usize,

    /// Symlinks deferred to the generated post-install script.
    pub deferred_symlinks: Vec<SymlinkRequest>,

    /// Value written to `Installed-Size`.
    pub installed_size_kb: u64,

    /// Bytes copied.
    pub bytes_copied: u64,

    /// Scripts accepted despite failing validation.
    pub forced_scripts: Vec<MaintainerScript>,

    /// Warnings always shown to the user, such as findings of forced scripts
    /// and symlinks that could not be deferred.
    pub warnings: Vec<String>,

    /// Wall-clock duration of the build.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl BuildReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a warning message.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Returns whether any warnings were recorded.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Files, directories and recreated symlinks in total.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.files_copied + self.directories_created + self.symlinks_recreated
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}
