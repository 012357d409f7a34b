//! Install-time script that materializes deferred symlinks.

use std::fmt::Write as _;
use std::path::Path;

use super::SymlinkRequest;

/// Shell function emitted once per script; one call per link follows.
const LINK_FUNCTION: &str = r#"safedeb_link() {
    mkdir -p "$(dirname "$2")"
    if [ ! -e "$2" ] && [ ! -L "$2" ]; then
        ln -s "$1" "$2"
    else
        echo "Warning: $2 already exists, not creating symlink" >&2
    fi
}
"#;

/// Quotes `path` for POSIX sh, escaping embedded single quotes.
#[must_use]
pub fn shell_quote(path: &Path) -> String {
    let text = path.to_string_lossy();
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Renders the link function and one call per request, without an
/// interpreter line.
///
/// Re-running the block is harmless: existing targets are reported and
/// left untouched.
#[must_use]
pub fn render_symlink_block(requests: &[SymlinkRequest]) -> String {
    let mut out = String::from("# Deferred symlinks generated by safedeb\n");
    out.push_str(LINK_FUNCTION);
    out.push('\n');
    for request in requests {
        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "safedeb_link {} {}",
            shell_quote(&request.source),
            shell_quote(&request.target)
        );
    }
    out
}

/// Renders a complete post-install script for `requests`.
///
/// # Examples
///
/// ```
/// use safedeb_core::symlink::{SymlinkRequest, render_symlink_script};
///
/// let script = render_symlink_script(&[SymlinkRequest::new(
///     "/opt/usr/share/applications/app.desktop",
///     "/usr/share/applications/app.desktop",
///     "launcher",
/// )]);
///
/// assert!(script.starts_with("#!/bin/sh\n"));
/// assert!(script.contains(
///     "safedeb_link '/opt/usr/share/applications/app.desktop' '/usr/share/applications/app.desktop'"
/// ));
/// ```
#[must_use]
pub fn render_symlink_script(requests: &[SymlinkRequest]) -> String {
    format!("#!/bin/sh\nset -e\n\n{}", render_symlink_block(requests))
}

/// Inserts `block` into an existing post-install script.
///
/// The block goes directly after the interpreter line so that an early
/// `exit` in the user script cannot skip it. Without an interpreter line
/// the block is placed first.
#[must_use]
pub fn merge_into_script(user_script: &str, block: &str) -> String {
    match user_script.split_once('\n') {
        Some((first, rest)) if first.starts_with("#!") => {
            format!("{first}\n\n{block}\n{rest}")
        }
        None if user_script.starts_with("#!") => format!("{user_script}\n\n{block}"),
        _ => format!("{block}\n{user_script}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: &str, target: &str) -> SymlinkRequest {
        SymlinkRequest::new(source, target, "test")
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote(Path::new("/opt/a b")), "'/opt/a b'");
        assert_eq!(shell_quote(Path::new("/opt/it's")), r"'/opt/it'\''s'");
    }

    #[test]
    fn test_script_has_one_call_per_request() {
        let script = render_symlink_script(&[
            request("/opt/usr/share/man/man1/a.1", "/usr/share/man/man1/a.1"),
            request("/opt/usr/share/icons/a.svg", "/usr/share/icons/a.svg"),
        ]);
        assert!(script.starts_with("#!/bin/sh\nset -e\n"));
        assert_eq!(script.matches("\nsafedeb_link '").count(), 2);
        assert!(script.contains("[ ! -e \"$2\" ] && [ ! -L \"$2\" ]"));
        assert!(!script.contains("ln -sf"));
    }

    #[test]
    fn test_merge_after_shebang() {
        let user = "#!/bin/sh\nset -e\nupdate-desktop-database\nexit 0\n";
        let merged = merge_into_script(user, "BLOCK\n");
        assert!(merged.starts_with("#!/bin/sh\n\nBLOCK\n"));
        assert!(merged.ends_with("exit 0\n"));
        let block_at = merged.find("BLOCK").unwrap_or(usize::MAX);
        let exit_at = merged.find("exit 0").unwrap_or(0);
        assert!(block_at < exit_at);
    }

    #[test]
    fn test_merge_without_shebang() {
        assert_eq!(merge_into_script("echo hi\n", "BLOCK\n"), "BLOCK\n\necho hi\n");
        assert_eq!(merge_into_script("#!/bin/sh", "BLOCK\n"), "#!/bin/sh\n\nBLOCK\n");
    }
}
