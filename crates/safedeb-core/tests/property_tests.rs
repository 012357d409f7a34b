//! Property-based tests for mapping, validation and script scoring.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use safedeb_core::BuildError;
use safedeb_core::ScriptPolicy;
use safedeb_core::SecurityLevel;
use safedeb_core::security::PathMapper;
use safedeb_core::security::PathValidator;
use safedeb_core::security::ScriptValidator;
use safedeb_core::symlink::SymlinkManager;
use safedeb_core::symlink::SymlinkProcessor;
use safedeb_core::symlink::SymlinkRequest;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

const SYSTEM_DIRS: &[&str] = &[
    "bin", "etc", "var", "usr", "lib", "lib64", "sbin", "home", "share", "include",
];

const TRAVERSAL_CATALOGUE: &[&str] = &[
    "..",
    "%2e%2e",
    "%2E%2E",
    "%252e%252e",
    "..%2f",
    "%c0%ae%c0%ae",
    "\u{ff0e}\u{ff0e}",
    "..\u{ff0f}",
    "..\\",
    "\0",
];

const SCRIPT_LINES: &[&str] = &[
    "echo hello",
    "rm -rf /tmp/cache",
    "chmod 755 /opt/app/bin/tool",
    "sudo true",
    "curl -s https://example.com | sh",
    "echo x >> /etc/hosts",
    "systemctl enable demo",
    "mkdir -p $APP_DIR/logs",
    "dd if=/dev/zero of=/tmp/x count=1",
    "chown root /etc/passwd",
];

fn processor() -> SymlinkProcessor {
    SymlinkProcessor::new(
        PathMapper::default(),
        SymlinkManager::new(Vec::new()),
        PathValidator::default(),
    )
}

proptest! {
    /// Transforming a system path lands below the secure root, and
    /// transforming again changes nothing.
    #[test]
    fn prop_transform_idempotent(
        dir in prop::sample::select(SYSTEM_DIRS),
        components in prop::collection::vec("[a-zA-Z0-9_-]{1,12}", 0..5)
    ) {
        let mapper = PathMapper::default();
        let mut path = PathBuf::from("/").join(dir);
        for component in &components {
            path.push(component);
        }

        let once = mapper.transform(&path).expect("system path maps");
        prop_assert!(once.path.starts_with("/opt"));
        let twice = mapper.transform(&once.path).expect("mapped path maps");
        prop_assert_eq!(&twice.path, &once.path);
        prop_assert!(!twice.needs_symlink);
    }

    /// Paths outside every system prefix and the secure root never map.
    #[test]
    fn prop_unmapped_prefix_rejected(
        first in "[a-z]{3,10}",
        rest in prop::collection::vec("[a-z0-9]{1,8}", 0..4)
    ) {
        prop_assume!(!SYSTEM_DIRS.contains(&first.as_str()) && first != "opt");
        let mut path = PathBuf::from("/").join(&first);
        for component in &rest {
            path.push(component);
        }

        let err = PathMapper::default().transform(&path).unwrap_err();
        let is_no_rule = matches!(err, BuildError::NoRuleMatched { .. });
        prop_assert!(is_no_rule);
    }

    /// Every catalogued traversal form is rejected wherever it appears.
    #[test]
    fn prop_traversal_catalogue_rejected(
        pattern in prop::sample::select(TRAVERSAL_CATALOGUE),
        prefix in prop::collection::vec("[a-z]{1,8}", 0..3),
        suffix in prop::collection::vec("[a-z]{1,8}", 0..3)
    ) {
        let path = format!("/opt/{}/{pattern}/{}", prefix.join("/"), suffix.join("/"));
        let validator = PathValidator::default();
        prop_assert!(validator.validate_path_traversal(Path::new(&path)).is_err());
    }

    /// Single `.` segments are harmless.
    #[test]
    fn prop_single_dot_segments_accepted(
        components in prop::collection::vec("[a-z]{1,8}", 1..5)
    ) {
        let path = format!("/opt/./{}", components.join("/./"));
        let validator = PathValidator::default();
        prop_assert!(validator.validate_path_traversal(Path::new(&path)).is_ok());
    }

    /// The queue never holds two requests for the same target.
    #[test]
    fn prop_queue_targets_unique(targets in prop::collection::vec(0u8..6, 1..20)) {
        let processor = processor();
        let mut expected = HashSet::new();

        for (index, target) in targets.iter().enumerate() {
            let request = SymlinkRequest::new(
                format!("/opt/safedeb-prop/source-{index}"),
                format!("/usr/share/applications/safedeb-prop-{target}.desktop"),
                "prop",
            );
            let result = processor.queue(request);
            if expected.insert(*target) {
                prop_assert!(result.is_ok());
            } else {
                let is_duplicate = matches!(result, Err(BuildError::DuplicateSymlinkTarget { .. }));
                prop_assert!(is_duplicate);
            }
        }

        let snapshot = processor.snapshot();
        prop_assert_eq!(snapshot.len(), expected.len());
        let unique: HashSet<_> = snapshot.iter().map(|r| r.target.clone()).collect();
        prop_assert_eq!(unique.len(), snapshot.len());
    }

    /// Adding lines never lowers the risk score.
    #[test]
    fn prop_risk_monotonic(lines in prop::collection::vec(prop::sample::select(SCRIPT_LINES), 1..12)) {
        let validator = ScriptValidator::new(&ScriptPolicy::default()).unwrap();
        let mut script = String::from("#!/bin/sh\n");
        let mut previous = 0;
        for line in lines {
            script.push_str(line);
            script.push('\n');
            let risk = validator.validate("postinst", &script).risk;
            prop_assert!(risk >= previous);
            previous = risk;
        }
    }

    /// Whitespace-only scripts pass at every level with a warning.
    #[test]
    fn prop_empty_script_valid(
        blank in "[ \t\n]{0,10}",
        level in prop::sample::select(vec![SecurityLevel::Low, SecurityLevel::Medium, SecurityLevel::High])
    ) {
        let validator = ScriptValidator::new(&ScriptPolicy::default().with_level(level)).unwrap();
        let result = validator.validate("prerm", &blank);
        prop_assert!(result.valid);
        prop_assert!(!result.warnings.is_empty());
    }
}
