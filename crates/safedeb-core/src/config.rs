//! Immutable configuration for mapping, validation and building.
//!
//! Each struct has secure defaults, `with_*` builder methods and derives
//! `serde::Deserialize` with `#[serde(default)]`, so partial TOML tables
//! fill the remaining fields from [`Default`].

use crate::types::MappingRule;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default isolated prefix for redirected system paths.
pub const DEFAULT_SECURE_ROOT: &str = "/opt";

/// System directories redirected below the secure root by default.
pub const DEFAULT_SYSTEM_DIRS: &[&str] = &[
    "/bin", "/etc", "/var", "/usr", "/lib", "/lib64", "/sbin", "/home", "/share", "/include",
];

/// Directories where legacy tooling expects real entries, so a symlink back
/// from the isolated location is required.
pub const DEFAULT_SYMLINK_DIRS: &[&str] = &[
    "/etc/systemd/system",
    "/etc/init.d",
    "/usr/share/applications",
    "/usr/share/icons",
    "/usr/share/man",
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
];

fn rule_under(root: &Path, system: &str) -> MappingRule {
    let relative = system.trim_start_matches('/');
    MappingRule::new(system, root.join(relative))
}

/// Path mapper configuration.
///
/// # Examples
///
/// ```
/// use safedeb_core::MapperConfig;
/// use std::path::Path;
///
/// let config = MapperConfig::default()
///     .with_secure_root("/srv/isolated")
///     .with_mapping("/srv/www", "/srv/isolated/www");
///
/// assert_eq!(config.secure_root, Path::new("/srv/isolated"));
/// assert!(config.mappings.iter().any(|r| r.secure == Path::new("/srv/isolated/etc")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Isolated prefix. Paths already below it are never rewritten.
    pub secure_root: PathBuf,

    /// Rewrite rules. Order is irrelevant: the mapper sorts them.
    pub mappings: Vec<MappingRule>,

    /// Directories whose entries (and descendants) need an install-time
    /// symlink from the conventional location.
    pub symlink_dirs: Vec<PathBuf>,
}

impl Default for MapperConfig {
    /// Default values:
    /// - `secure_root`: `/opt`
    /// - `mappings`: each of [`DEFAULT_SYSTEM_DIRS`] to the same name below `/opt`
    /// - `symlink_dirs`: [`DEFAULT_SYMLINK_DIRS`]
    fn default() -> Self {
        let root = PathBuf::from(DEFAULT_SECURE_ROOT);
        Self {
            mappings: DEFAULT_SYSTEM_DIRS
                .iter()
                .map(|dir| rule_under(&root, dir))
                .collect(),
            symlink_dirs: DEFAULT_SYMLINK_DIRS.iter().map(PathBuf::from).collect(),
            secure_root: root,
        }
    }
}

impl MapperConfig {
    /// Moves the secure root, rebasing every rule whose secure prefix lived
    /// below the previous root.
    #[must_use]
    pub fn with_secure_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        for rule in &mut self.mappings {
            if let Ok(rest) = rule.secure.strip_prefix(&self.secure_root) {
                rule.secure = if rest.as_os_str().is_empty() {
                    root.clone()
                } else {
                    root.join(rest)
                };
            }
        }
        self.secure_root = root;
        self
    }

    /// Adds a rule, replacing any rule for the same system prefix.
    #[must_use]
    pub fn with_mapping(mut self, system: impl Into<PathBuf>, secure: impl Into<PathBuf>) -> Self {
        let rule = MappingRule::new(system, secure);
        self.mappings.retain(|r| r.system != rule.system);
        self.mappings.push(rule);
        self
    }

    /// Adds a symlink-required directory.
    #[must_use]
    pub fn with_symlink_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !self.symlink_dirs.contains(&dir) {
            self.symlink_dirs.push(dir);
        }
        self
    }
}

/// Path validation policy.
///
/// Forbidden prefixes are hard failures; restricted prefixes and unlisted
/// extensions only produce warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Prefixes that may never be written.
    pub forbidden_paths: Vec<PathBuf>,

    /// Prefixes that produce a warning.
    pub restricted_paths: Vec<PathBuf>,

    /// Extensions (with leading dot) that do not produce a warning.
    pub allowed_extensions: Vec<String>,

    /// Maximum path length in bytes.
    pub max_path_length: usize,

    /// Reject paths carrying literal `..` segments.
    pub disallow_dot_dot: bool,

    /// Paths below this root skip the restricted and extension advisories.
    pub secure_root: PathBuf,
}

impl Default for SecurityPolicy {
    /// Default values:
    /// - `forbidden_paths`: `/bin /sbin /usr/bin /usr/sbin /boot /proc /sys /dev`
    /// - `restricted_paths`: `/etc/passwd /etc/shadow /etc/sudoers /etc/ssh
    ///   /etc/ssl/private`
    /// - `allowed_extensions`: text, config, unit, script, markup and image
    ///   types
    /// - `max_path_length`: 4096
    /// - `disallow_dot_dot`: true
    /// - `secure_root`: `/opt`
    fn default() -> Self {
        Self {
            forbidden_paths: [
                "/bin",
                "/sbin",
                "/usr/bin",
                "/usr/sbin",
                "/boot",
                "/proc",
                "/sys",
                "/dev",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            restricted_paths: [
                "/etc/passwd",
                "/etc/shadow",
                "/etc/sudoers",
                "/etc/ssh",
                "/etc/ssl/private",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            allowed_extensions: [
                ".txt", ".conf", ".service", ".socket", ".target", ".sh", ".xml", ".json", ".yml",
                ".yaml", ".desktop", ".png", ".svg", ".jpg", ".jpeg", ".gif", ".md", ".html",
                ".css", ".js",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            max_path_length: 4096,
            disallow_dot_dot: true,
            secure_root: PathBuf::from(DEFAULT_SECURE_ROOT),
        }
    }
}

impl SecurityPolicy {
    /// Sets the secure root used for the advisory short-circuit.
    #[must_use]
    pub fn with_secure_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.secure_root = root.into();
        self
    }

    /// Adds a forbidden prefix.
    #[must_use]
    pub fn with_forbidden_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.forbidden_paths.push(path.into());
        self
    }

    /// Sets the maximum path length.
    #[must_use]
    pub fn with_max_path_length(mut self, max: usize) -> Self {
        self.max_path_length = max;
        self
    }

    /// Returns `true` when `ext` (with or without leading dot) is allowed.
    ///
    /// Comparison is case-insensitive.
    #[must_use]
    pub fn is_extension_allowed(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Strictness applied to lifecycle script verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Invalid only when errors > 3 or risk > 8.
    Low,
    /// Invalid on any error or risk > 6.
    #[default]
    Medium,
    /// Invalid on any error, more than 3 warnings, or risk > 4.
    High,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

impl FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown security level: {other}")),
        }
    }
}

/// Lifecycle script analysis policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptPolicy {
    /// Verdict strictness.
    pub level: SecurityLevel,

    /// Additional regular expressions scored like the built-in patterns.
    pub extra_patterns: Vec<String>,
}

impl ScriptPolicy {
    /// Sets the security level.
    #[must_use]
    pub fn with_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    /// Adds a dangerous pattern.
    #[must_use]
    pub fn with_extra_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.extra_patterns.push(pattern.into());
        self
    }
}

/// What the builder does when a symlink request cannot be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymlinkFailurePolicy {
    /// Log the failure and continue the build.
    #[default]
    BestEffort,
    /// Abort the build.
    FailFast,
}

/// Build flags and walk options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Keep source file modes instead of normalizing to 0644/0755.
    pub preserve_permissions: bool,

    /// Fail fast on symlink queue failures and validate scripts at
    /// [`SecurityLevel::High`].
    pub strict: bool,

    /// Never queue deferred symlinks.
    pub disable_symlinks: bool,

    /// Force-accept lifecycle scripts that fail validation.
    pub ignore_script_validation: bool,

    /// Source-relative directories skipped during the walk.
    pub exclude_dirs: Vec<PathBuf>,

    /// Handling of symlink queue failures when not strict.
    pub symlink_failure: SymlinkFailurePolicy,

    /// Parent directory for the staging tree (system temp dir when unset).
    pub staging_parent: Option<PathBuf>,

    /// Wall-clock budget used by callers of `build_with_timeout`.
    pub timeout_secs: u64,
}

impl Default for BuildOptions {
    /// Default values:
    /// - every flag `false`
    /// - `exclude_dirs`: empty
    /// - `symlink_failure`: [`SymlinkFailurePolicy::BestEffort`]
    /// - `staging_parent`: `None`
    /// - `timeout_secs`: 600
    fn default() -> Self {
        Self {
            preserve_permissions: false,
            strict: false,
            disable_symlinks: false,
            ignore_script_validation: false,
            exclude_dirs: Vec::new(),
            symlink_failure: SymlinkFailurePolicy::BestEffort,
            staging_parent: None,
            timeout_secs: 600,
        }
    }
}

impl BuildOptions {
    /// Sets permission preservation.
    #[must_use]
    pub fn with_preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// Enables strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Disables deferred symlinks.
    #[must_use]
    pub fn with_disable_symlinks(mut self, disable: bool) -> Self {
        self.disable_symlinks = disable;
        self
    }

    /// Force-accepts rejected scripts.
    #[must_use]
    pub fn with_ignore_script_validation(mut self, ignore: bool) -> Self {
        self.ignore_script_validation = ignore;
        self
    }

    /// Adds an excluded source-relative directory.
    #[must_use]
    pub fn with_exclude_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude_dirs.push(dir.into());
        self
    }

    /// Sets the symlink failure policy.
    #[must_use]
    pub fn with_symlink_failure(mut self, policy: SymlinkFailurePolicy) -> Self {
        self.symlink_failure = policy;
        self
    }

    /// Sets the staging parent directory.
    #[must_use]
    pub fn with_staging_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_parent = Some(dir.into());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Symlink failure policy after applying `strict`.
    #[must_use]
    pub const fn effective_symlink_failure(&self) -> SymlinkFailurePolicy {
        if self.strict {
            SymlinkFailurePolicy::FailFast
        } else {
            self.symlink_failure
        }
    }
}

/// Complete configuration for one [`Builder`](crate::Builder).
///
/// # Examples
///
/// ```
/// use safedeb_core::{BuilderConfig, SecurityLevel};
///
/// let config: BuilderConfig = toml::from_str(
///     r#"
///     [script]
///     level = "high"
///
///     [options]
///     exclude_dirs = [".git"]
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.script.level, SecurityLevel::High);
/// assert_eq!(config.options.timeout_secs, 600);
/// assert_eq!(config.mapper.secure_root.to_str(), Some("/opt"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Path mapper configuration.
    pub mapper: MapperConfig,
    /// Path validation policy.
    pub security: SecurityPolicy,
    /// Script analysis policy.
    pub script: ScriptPolicy,
    /// Build flags.
    pub options: BuildOptions,
}

impl BuilderConfig {
    /// Sets build options.
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the mapper configuration and aligns the validator's secure root.
    #[must_use]
    pub fn with_mapper(mut self, mapper: MapperConfig) -> Self {
        self.security.secure_root.clone_from(&mapper.secure_root);
        self.mapper = mapper;
        self
    }

    /// Sets the path validation policy.
    #[must_use]
    pub fn with_security(mut self, security: SecurityPolicy) -> Self {
        self.security = security;
        self
    }

    /// Sets the script policy.
    #[must_use]
    pub fn with_script(mut self, script: ScriptPolicy) -> Self {
        self.script = script;
        self
    }

    /// Script policy after applying `strict`.
    #[must_use]
    pub fn effective_script_policy(&self) -> ScriptPolicy {
        let mut policy = self.script.clone();
        if self.options.strict {
            policy.level = SecurityLevel::High;
        }
        policy
    }
}
