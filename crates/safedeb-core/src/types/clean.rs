//! Lexical path normalization.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Returns the shortest path equivalent to `path` by lexical processing.
///
/// Rules:
/// - repeated separators and `.` segments are removed
/// - `..` removes the preceding normal segment
/// - `..` directly below the root is dropped (`/..` is `/`)
/// - leading `..` of a relative path is kept
/// - an empty result becomes `.` (or `/` for rooted paths)
///
/// The filesystem is never consulted, so symlinks are not resolved.
///
/// # Examples
///
/// ```
/// use safedeb_core::types::clean_path;
/// use std::path::Path;
///
/// assert_eq!(clean_path(Path::new("/usr/local/../bin/app")), Path::new("/usr/bin/app"));
/// assert_eq!(clean_path(Path::new("/../etc")), Path::new("/etc"));
/// assert_eq!(clean_path(Path::new("a/./b/../../..")), Path::new(".."));
/// assert_eq!(clean_path(Path::new("")), Path::new("."));
/// ```
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut rooted = false;
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::RootDir => rooted = true,
            Component::Prefix(_) => parts.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(parts.last(), Some(Component::Normal(_))) {
                    parts.pop();
                } else if !rooted {
                    parts.push(component);
                }
            }
            Component::Normal(_) => parts.push(component),
        }
    }

    let mut out = PathBuf::new();
    if rooted {
        out.push(Component::RootDir.as_os_str());
    }
    for part in parts {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Returns `true` when any component of `path` is a literal `..`.
#[must_use]
pub fn has_parent_segment(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}
