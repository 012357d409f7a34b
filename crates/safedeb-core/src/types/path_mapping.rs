//! Ordered prefix rewrite table.

use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

/// One `system prefix -> secure prefix` rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    /// System directory being redirected, e.g. `/etc`.
    pub system: PathBuf,
    /// Replacement directory, e.g. `/opt/etc`.
    pub secure: PathBuf,
}

impl MappingRule {
    /// Creates a rule.
    pub fn new(system: impl Into<PathBuf>, secure: impl Into<PathBuf>) -> Self {
        Self {
            system: system.into(),
            secure: secure.into(),
        }
    }

    /// Returns `true` when `path` equals the system prefix or lies below it.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.starts_with(&self.system)
    }

    /// Rewrites `path`, or returns `None` when the rule does not match.
    #[must_use]
    pub fn apply(&self, path: &Path) -> Option<PathBuf> {
        let rest = path.strip_prefix(&self.system).ok()?;
        if rest.as_os_str().is_empty() {
            Some(self.secure.clone())
        } else {
            Some(self.secure.join(rest))
        }
    }
}

/// Deterministic longest-prefix-wins mapping table.
///
/// Rules are kept sorted by descending byte length of the system prefix,
/// then lexically by system prefix and secure prefix. When several rules
/// share a system prefix only the first one in that order is kept, so the
/// outcome never depends on the order rules were supplied in.
///
/// # Examples
///
/// ```
/// use safedeb_core::types::{MappingRule, PathMapping};
/// use std::path::Path;
///
/// let table = PathMapping::new(vec![
///     MappingRule::new("/usr", "/opt/usr"),
///     MappingRule::new("/usr/share", "/opt/share"),
/// ]);
///
/// let rule = table.resolve(Path::new("/usr/share/doc")).unwrap();
/// assert_eq!(rule.system, Path::new("/usr/share"));
/// assert!(table.resolve(Path::new("/srv/www")).is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMapping {
    rules: Vec<MappingRule>,
}

impl PathMapping {
    /// Builds the table, ordering and de-duplicating `rules`.
    #[must_use]
    pub fn new(rules: impl IntoIterator<Item = MappingRule>) -> Self {
        let mut rules: Vec<MappingRule> = rules.into_iter().collect();
        rules.sort_by(|a, b| {
            let a_len = a.system.as_os_str().len();
            let b_len = b.system.as_os_str().len();
            b_len
                .cmp(&a_len)
                .then_with(|| a.system.cmp(&b.system))
                .then_with(|| a.secure.cmp(&b.secure))
        });
        rules.dedup_by(|later, earlier| later.system == earlier.system);
        Self { rules }
    }

    /// Returns the longest rule whose system prefix matches `path`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<&MappingRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    /// Rules in resolution order.
    #[must_use]
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
