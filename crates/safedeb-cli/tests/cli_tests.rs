//! Integration tests for safedeb-cli.
//!
//! Note: Tests use `unwrap`/`expect` which is acceptable in test code.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempDir;

fn safedeb_cmd() -> Command {
    cargo_bin_cmd!("safedeb")
}

fn write_script(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("failed to write script");
    path
}

/// Source tree with a single documentation file.
fn source_tree(root: &Path) -> PathBuf {
    let source = root.join("src");
    fs::create_dir_all(source.join("usr/share/doc/hello")).unwrap();
    fs::write(source.join("usr/share/doc/hello/README"), "hello\n").unwrap();
    source
}

/// Archiver stand-in that only creates the output file, its fourth argument.
#[cfg(unix)]
fn fake_archiver(root: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = root.join("fake-dpkg-deb");
    fs::write(&path, "#!/bin/sh\ntouch \"$4\"\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_version_flag() {
    safedeb_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("safedeb"));
}

#[test]
fn test_help_flag() {
    safedeb_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("symlink"));
}

#[test]
fn test_build_help() {
    safedeb_cmd()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--ignore-script-validation"));
}

#[test]
fn test_map_relocates_system_paths() {
    safedeb_cmd()
        .args(["map", "/etc/hello.conf", "/usr/share/applications/hello.desktop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/hello.conf -> /opt/etc/hello.conf"))
        .stdout(predicate::str::contains(
            "/opt/usr/share/applications/hello.desktop (symlink)",
        ));
}

#[test]
fn test_map_reports_unmapped_path() {
    safedeb_cmd()
        .args(["map", "/srv/data"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("/srv/data"))
        .stderr(predicate::str::contains("1 of 1 paths could not be mapped"));
}

#[test]
fn test_map_json_output() {
    let output = safedeb_cmd()
        .args(["--json", "map", "/var/lib/hello"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["operation"], "map");
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"][0]["transformed"], "/opt/var/lib/hello");
}

#[test]
fn test_script_check_safe_script() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), "postinst", "#!/bin/sh\necho installed\nexit 0\n");

    safedeb_cmd()
        .args(["script", "check"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid: true"));
}

#[test]
fn test_script_check_rejects_dangerous_script() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), "postinst", "#!/bin/sh\nchmod 777 /etc/passwd\n");

    safedeb_cmd()
        .args(["script", "check"])
        .arg(&script)
        .assert()
        .failure()
        .stdout(predicate::str::contains("/etc/passwd"))
        .stderr(predicate::str::contains("rejected at medium"));
}

#[test]
fn test_script_check_level_override() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), "postinst", "#!/bin/sh\nsudo true\n");

    safedeb_cmd()
        .args(["script", "check"])
        .arg(&script)
        .assert()
        .success();

    safedeb_cmd()
        .args(["script", "check", "--level", "high"])
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--ignore-script-validation"));
}

#[test]
fn test_script_check_json_failure() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), "prerm", "#!/bin/sh\nrm -rf /bin/ls\n");

    let output = safedeb_cmd()
        .args(["--json", "script", "check"])
        .arg(&script)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["data"]["valid"], false);
    assert_eq!(json["data"]["assessment"]["band"], "High");
}

#[test]
fn test_build_requires_maintainer() {
    let temp = TempDir::new().unwrap();
    let source = source_tree(temp.path());

    safedeb_cmd()
        .args(["build", "--name", "hello", "--version", "1.0.0"])
        .arg("--source")
        .arg(&source)
        .arg("--output")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--maintainer is required"));
}

#[test]
fn test_build_missing_source() {
    let temp = TempDir::new().unwrap();

    safedeb_cmd()
        .args([
            "build",
            "--name",
            "hello",
            "--version",
            "1.0.0",
            "--maintainer",
            "Jane Doe <jane@example.com>",
        ])
        .arg("--source")
        .arg(temp.path().join("missing"))
        .arg("--output")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source"));
}

#[cfg(unix)]
#[test]
fn test_build_with_custom_archiver() {
    let temp = TempDir::new().unwrap();
    let source = source_tree(temp.path());
    let archiver = fake_archiver(temp.path());
    let out = temp.path().join("out");

    safedeb_cmd()
        .args([
            "build",
            "--name",
            "hello",
            "--version",
            "1.0.0",
            "--maintainer",
            "Jane Doe <jane@example.com>",
            "--arch",
            "all",
        ])
        .arg("--source")
        .arg(&source)
        .arg("--output")
        .arg(&out)
        .arg("--archiver")
        .arg(&archiver)
        .assert()
        .success()
        .stdout(predicate::str::contains("Package built:"))
        .stdout(predicate::str::contains("hello_1.0.0_all.deb"));

    assert!(out.join("hello_1.0.0_all.deb").exists());
}

#[cfg(unix)]
#[test]
fn test_build_rejects_dangerous_script() {
    let temp = TempDir::new().unwrap();
    let source = source_tree(temp.path());
    let archiver = fake_archiver(temp.path());
    let script = write_script(temp.path(), "postinst.sh", "#!/bin/sh\nrm -rf /bin/ls\n");

    let base = |cmd: &mut Command| {
        cmd.args([
            "build",
            "--name",
            "hello",
            "--version",
            "1.0.0",
            "--maintainer",
            "Jane Doe <jane@example.com>",
            "--arch",
            "all",
        ])
        .arg("--source")
        .arg(&source)
        .arg("--output")
        .arg(temp.path())
        .arg("--archiver")
        .arg(&archiver)
        .arg("--script")
        .arg(&script);
    };

    let mut rejected = safedeb_cmd();
    base(&mut rejected);
    rejected
        .assert()
        .failure()
        .stderr(predicate::str::contains("script validation failed for postinst"))
        .stderr(predicate::str::contains("--ignore-script-validation"));

    let mut forced = safedeb_cmd();
    base(&mut forced);
    forced
        .arg("--ignore-script-validation")
        .assert()
        .success()
        .stdout(predicate::str::contains("Warnings:"))
        .stderr(predicate::str::contains("continuing due to --ignore-script-validation"));
}

#[test]
fn test_build_rejects_unknown_script_slot() {
    let temp = TempDir::new().unwrap();
    let source = source_tree(temp.path());
    let script = write_script(temp.path(), "setup.sh", "#!/bin/sh\nexit 0\n");

    safedeb_cmd()
        .args([
            "build",
            "--name",
            "hello",
            "--version",
            "1.0.0",
            "--maintainer",
            "Jane Doe <jane@example.com>",
        ])
        .arg("--source")
        .arg(&source)
        .arg("--output")
        .arg(temp.path())
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot tell the script slot"));
}

#[cfg(unix)]
#[test]
fn test_build_from_config_file() {
    let temp = TempDir::new().unwrap();
    let source = source_tree(temp.path());
    let archiver = fake_archiver(temp.path());
    let config = temp.path().join("safedeb.toml");
    fs::write(
        &config,
        r#"
[package]
name = "hello"
version = "2.1.0"
maintainer = "Jane Doe <jane@example.com>"
architecture = "all"

[build.options]
timeout_secs = 30
"#,
    )
    .unwrap();

    safedeb_cmd()
        .arg("--config")
        .arg(&config)
        .arg("build")
        .arg("--source")
        .arg(&source)
        .arg("--output")
        .arg(temp.path())
        .arg("--archiver")
        .arg(&archiver)
        .assert()
        .success();

    assert!(temp.path().join("hello_2.1.0_all.deb").exists());
}

#[test]
fn test_invalid_config_file() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("bad.toml");
    fs::write(&config, "[unknown]\nkey = 1\n").unwrap();

    safedeb_cmd()
        .arg("--config")
        .arg(&config)
        .args(["map", "/etc/hello.conf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn test_symlink_create_dry_run() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("link");

    safedeb_cmd()
        .args(["symlink", "create", "--dry-run"])
        .arg("--source")
        .arg(temp.path().join("real"))
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Would create symlink"));

    assert!(fs::symlink_metadata(&target).is_err());
}

#[cfg(unix)]
#[test]
fn test_symlink_create_and_validate() {
    let temp = TempDir::new().unwrap();
    let real = temp.path().join("real");
    fs::write(&real, "data").unwrap();
    let target = temp.path().join("links/app");

    safedeb_cmd()
        .args(["symlink", "create"])
        .arg("--source")
        .arg(&real)
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created symlink"));

    assert_eq!(fs::read_link(&target).unwrap(), real);

    // A second create never replaces the existing link.
    safedeb_cmd()
        .args(["symlink", "create"])
        .arg("--source")
        .arg(&real)
        .arg("--target")
        .arg(&target)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    // The link points outside /opt, which only fails in strict mode.
    safedeb_cmd()
        .args(["symlink", "validate"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("outside the secure root"));

    safedeb_cmd()
        .args(["symlink", "validate", "--strict"])
        .arg(&target)
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_symlink_validate_rejects_regular_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain");
    fs::write(&file, "x").unwrap();

    safedeb_cmd()
        .args(["symlink", "validate"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a symlink"));
}

#[cfg(unix)]
#[test]
fn test_symlink_list_under_prefix() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let apps = temp.path().join("usr/share/applications");
    fs::create_dir_all(&apps).unwrap();
    symlink(
        "/opt/usr/share/applications/hello.desktop",
        apps.join("hello.desktop"),
    )
    .unwrap();
    symlink("/usr/share/other.desktop", apps.join("other.desktop")).unwrap();

    safedeb_cmd()
        .args(["symlink", "list", "--prefix"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "/usr/share/applications/hello.desktop -> /opt/usr/share/applications/hello.desktop",
        ))
        .stdout(predicate::str::contains("other.desktop").not());

    safedeb_cmd()
        .args(["symlink", "list", "--all", "--prefix"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("other.desktop (external)"));
}

#[test]
fn test_symlink_list_empty_prefix() {
    let temp = TempDir::new().unwrap();

    safedeb_cmd()
        .args(["symlink", "list", "--prefix"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No managed symlinks found"));
}
