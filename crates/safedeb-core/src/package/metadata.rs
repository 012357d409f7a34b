//! Package metadata and the `control` file.

use serde::Deserialize;
use serde::Serialize;

use crate::BuildError;
use crate::Result;

/// Maps the compile-time target architecture to its Debian name.
///
/// Unknown architectures are returned unchanged.
#[must_use]
pub fn default_architecture() -> String {
    debian_architecture(std::env::consts::ARCH).to_string()
}

fn debian_architecture(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "i386",
        "arm" => "armhf",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Bytes rounded up to whole kilobytes, as used by `Installed-Size`.
#[must_use]
pub const fn installed_size_kb(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}

/// Metadata written to the package control file.
///
/// # Examples
///
/// ```
/// use safedeb_core::PackageMetadata;
///
/// let meta = PackageMetadata::new("hello", "1.0.0")
///     .with_maintainer("Jane Doe <jane@example.com>")
///     .with_architecture("amd64")
///     .with_depends(vec!["libc6".into(), "libssl3".into()]);
///
/// assert!(meta.validate().is_ok());
/// assert_eq!(meta.output_file_name(), "hello_1.0.0_amd64.deb");
///
/// let control = meta.render_control(12);
/// assert!(control.starts_with("Package: hello\nVersion: 1.0.0\n"));
/// assert!(control.contains("Depends: libc6, libssl3\n"));
/// assert!(control.contains("Installed-Size: 12\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMetadata {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Debian architecture name.
    pub architecture: String,
    /// `Name <email>` of the maintainer.
    pub maintainer: String,
    /// Single-line description. Falls back to the name when empty.
    pub description: String,
    /// Archive section.
    pub section: String,
    /// Priority.
    pub priority: String,
    /// Dependencies.
    pub depends: Vec<String>,
    /// Conflicting packages.
    pub conflicts: Vec<String>,
    /// Provided virtual packages.
    pub provides: Vec<String>,
    /// Upstream homepage.
    pub homepage: String,
}

impl Default for PackageMetadata {
    /// Default values:
    /// - `architecture`: [`default_architecture`]
    /// - `section`: `utils`
    /// - `priority`: `optional`
    /// - everything else empty
    fn default() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            architecture: default_architecture(),
            maintainer: String::new(),
            description: String::new(),
            section: "utils".to_string(),
            priority: "optional".to_string(),
            depends: Vec::new(),
            conflicts: Vec::new(),
            provides: Vec::new(),
            homepage: String::new(),
        }
    }
}

impl PackageMetadata {
    /// Creates metadata with a name and version and default other fields.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Sets the maintainer.
    #[must_use]
    pub fn with_maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.maintainer = maintainer.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the architecture.
    #[must_use]
    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_depends(mut self, depends: Vec<String>) -> Self {
        self.depends = depends;
        self
    }

    /// Sets the conflicts.
    #[must_use]
    pub fn with_conflicts(mut self, conflicts: Vec<String>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Sets the provided packages.
    #[must_use]
    pub fn with_provides(mut self, provides: Vec<String>) -> Self {
        self.provides = provides;
        self
    }

    /// Sets the homepage.
    #[must_use]
    pub fn with_homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = homepage.into();
        self
    }

    /// Checks the metadata before any build work starts.
    ///
    /// # Errors
    ///
    /// [`BuildError::InvalidMetadata`] when:
    /// - name or version is empty
    /// - the name is not a Debian package name (`[a-z0-9][a-z0-9+.-]+`)
    /// - the version uses characters outside `[A-Za-z0-9.+~:-]`
    /// - the architecture uses characters outside `[a-z0-9-]`
    /// - any field contains a line break
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> { Err(BuildError::InvalidMetadata { reason }) };

        if self.name.is_empty() {
            return invalid("package name cannot be empty".to_string());
        }
        if self.version.is_empty() {
            return invalid("package version cannot be empty".to_string());
        }
        if !is_debian_name(&self.name) {
            return invalid(format!(
                "package name '{}' must match [a-z0-9][a-z0-9+.-]+",
                self.name
            ));
        }
        if !is_debian_version(&self.version) {
            return invalid(format!(
                "package version '{}' must only use [A-Za-z0-9.+~:-]",
                self.version
            ));
        }
        if self.architecture.is_empty() {
            return invalid("architecture cannot be empty".to_string());
        }
        // Both end up in the output file name.
        if !self
            .architecture
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return invalid(format!(
                "architecture '{}' must only use [a-z0-9-]",
                self.architecture
            ));
        }

        let single_line = [
            ("maintainer", &self.maintainer),
            ("description", &self.description),
            ("section", &self.section),
            ("priority", &self.priority),
            ("homepage", &self.homepage),
            ("architecture", &self.architecture),
        ];
        for (field, value) in single_line {
            if value.contains(['\n', '\r']) {
                return invalid(format!("{field} must be a single line"));
            }
        }
        for (field, list) in [
            ("depends", &self.depends),
            ("conflicts", &self.conflicts),
            ("provides", &self.provides),
        ] {
            if list.iter().any(|v| v.contains(['\n', '\r', ','])) {
                return invalid(format!("{field} entries must be single items"));
            }
        }
        Ok(())
    }

    /// Renders the control file.
    ///
    /// Required fields come first. Optional fields are emitted only when
    /// non-empty, lists are joined with `", "`.
    #[must_use]
    pub fn render_control(&self, installed_size_kb: u64) -> String {
        let description = if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        };

        let mut lines = vec![
            format!("Package: {}", self.name),
            format!("Version: {}", self.version),
            format!("Architecture: {}", self.architecture),
            format!("Maintainer: {}", self.maintainer),
            format!("Description: {description}"),
        ];
        let optional = [("Section", &self.section), ("Priority", &self.priority)];
        for (field, value) in optional {
            if !value.is_empty() {
                lines.push(format!("{field}: {value}"));
            }
        }
        let lists = [
            ("Depends", &self.depends),
            ("Conflicts", &self.conflicts),
            ("Provides", &self.provides),
        ];
        for (field, values) in lists {
            if !values.is_empty() {
                lines.push(format!("{field}: {}", values.join(", ")));
            }
        }
        lines.push(format!("Installed-Size: {installed_size_kb}"));
        if !self.homepage.is_empty() {
            lines.push(format!("Homepage: {}", self.homepage));
        }

        let mut control = lines.join("\n");
        control.push('\n');
        control
    }

    /// `{name}_{version}_{architecture}.deb`.
    #[must_use]
    pub fn output_file_name(&self) -> String {
        format!("{}_{}_{}.deb", self.name, self.version, self.architecture)
    }
}

fn is_debian_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() >= 2
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '-'))
}

fn is_debian_version(version: &str) -> bool {
    version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | ':' | '-'))
}
