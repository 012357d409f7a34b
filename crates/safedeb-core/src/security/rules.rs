//! Fixed detection catalogues used by the path and script validators.

/// Percent-encoded dot-dot variants, compared against the lowercased path.
pub const ENCODED_TRAVERSAL: &[&str] = &[
    // single encoding
    "%2e%2e",
    // double encoding
    "%252e%252e",
    // mixed
    "%2e.",
    ".%2e",
    "%2e%2e%2f",
    // encoded separators
    "..%2f",
    ".%2f.",
    "%2e/",
    "/%2e%2e",
    // overlong UTF-8
    "%c0%ae%c0%ae",
    "%c0%ae.",
    ".%c0%ae",
];

/// Backslash and look-alike unicode dot-dot variants.
pub const UNICODE_TRAVERSAL: &[&str] = &[
    "..\\",
    "\\..\\",
    "\\../",
    "/..\\",
    // fullwidth full stop / solidus
    "\u{ff0e}\u{ff0e}/",
    "..\u{ff0f}",
    "\u{ff0e}\u{ff0e}\u{ff0f}",
    "\u{ff0e}\u{ff0e}",
    // division slash, fraction slash
    "..\u{2215}",
    "..\u{2044}",
];

/// Shell markers that only produce a warning in a path.
pub const SHELL_MARKERS: &[char] = &['~', '$', '`'];

/// Entries permitted inside the control directory.
pub const CONTROL_WHITELIST: &[&str] = &[
    "control",
    "preinst",
    "postinst",
    "prerm",
    "postrm",
    "conffiles",
    "shlibs",
    "triggers",
];

/// Name of the control directory at the top of a staging tree.
pub const CONTROL_DIR: &str = "DEBIAN";

/// Extensions of interpreted scripts shipped as package payload.
pub const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "py", "pl", "rb"];

/// Accepted interpreter lines for lifecycle scripts.
pub const SHELL_INTERPRETERS: &[&str] = &[
    "#!/bin/sh",
    "#!/bin/bash",
    "#!/usr/bin/env sh",
    "#!/usr/bin/env bash",
];

/// Risk added by each dangerous pattern match.
pub const PATTERN_RISK: u32 = 2;

/// Regular expressions for dangerous shell constructs.
pub const DANGEROUS_PATTERNS: &[&str] = &[
    // removal or permission changes rooted at /
    r"rm\s+(-[rf]+\s+)?/",
    r"chmod\s+([0-7]+\s+)?/",
    r"chown\s+([^/]+\s+)?/",
    // fetch piped to a shell
    r"wget\s+.+\s+\|\s+([ba])?sh",
    r"curl\s+.+\s+\|\s+([ba])?sh",
    // privilege escalation
    r"sudo",
    r"su\s+(-[a-z]+\s+)?root",
    r#"eval\s+["']"#,
    r"exec\s+[0-9]+",
    r"set(uid|gid)",
    // writes into /etc
    r">\s*/etc/",
    r">>\s*/etc/",
    // package managers
    r"apt(-get)?\s+(install|remove)",
    r"dpkg\s+(-i|--install)",
    r"update-alternatives",
    // init systems
    r"/etc/init.d/",
    r"systemctl\s+(enable|disable|mask)",
];

/// Dangerous commands and their base risk.
pub const DANGEROUS_COMMANDS: &[(&str, u32)] = &[
    ("rm", 7),
    ("chmod", 6),
    ("chown", 6),
    ("wget", 5),
    ("curl", 5),
    ("dd", 8),
    ("mkfs", 9),
    ("mount", 7),
    ("umount", 5),
    ("apt", 6),
    ("apt-get", 6),
    ("dpkg", 5),
    ("sudo", 9),
    ("su", 9),
    ("init", 10),
    ("systemctl", 6),
    ("service", 6),
    ("useradd", 7),
    ("usermod", 7),
    ("groupadd", 6),
    ("sysctl", 8),
    ("iptables", 7),
    ("update-rc.d", 6),
];

/// Paths whose mention next to a dangerous command is an error.
pub const PROTECTED_PATHS: &[&str] = &[
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/lib",
    "/lib64",
    "/etc/passwd",
    "/etc/shadow",
    "/etc/sudoers",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/var/run",
    "/var/lock",
];

/// Absolute path tokens in a script line.
pub const PATH_TOKEN: &str = r#"(?:^|\s+)(/[^\s;|><"']+)"#;
