//! External archiver collaborator.

use std::io::Read;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use super::CancellationToken;
use crate::BuildError;
use crate::Result;

/// Interval between child status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Turns a populated staging tree into a package file.
///
/// Implementations must honour `cancel` while they run and return
/// [`BuildError::Cancelled`] once it fires.
pub trait Archiver: Send + Sync {
    /// Short program name used in logs and errors.
    fn name(&self) -> &str;

    /// Archives `staging` into `output`.
    ///
    /// # Errors
    ///
    /// [`BuildError::ArchiverFailed`] on tool failure,
    /// [`BuildError::Cancelled`] on cancellation.
    fn archive(&self, staging: &Path, output: &Path, cancel: &CancellationToken) -> Result<()>;
}

/// Runs `dpkg-deb --build --root-owner-group <staging> <output>`.
#[derive(Debug, Clone)]
pub struct DpkgDeb {
    program: String,
}

impl DpkgDeb {
    /// Uses `program` instead of `dpkg-deb`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DpkgDeb {
    /// Looks `dpkg-deb` up on `PATH`.
    fn default() -> Self {
        Self::new("dpkg-deb")
    }
}

impl Archiver for DpkgDeb {
    fn name(&self) -> &str {
        &self.program
    }

    fn archive(&self, staging: &Path, output: &Path, cancel: &CancellationToken) -> Result<()> {
        cancel.check()?;
        debug!(
            program = %self.program,
            staging = %staging.display(),
            output = %output.display(),
            "running archiver"
        );

        let mut child = Command::new(&self.program)
            .arg("--build")
            .arg("--root-owner-group")
            .arg(staging)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr on a side thread so a chatty tool cannot fill the pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                warn!(program = %self.program, "cancelling archiver");
                let _ = child.kill();
                let _ = child.wait();
                if let Some(reader) = stderr_reader {
                    let _ = reader.join();
                }
                return Err(BuildError::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(BuildError::ArchiverFailed {
                tool: self.program.clone(),
                code: status.code(),
                stderr,
            })
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;
    use tempfile::TempDir;

    fn fake_tool(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-archiver");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_default_program() {
        assert_eq!(DpkgDeb::default().name(), "dpkg-deb");
    }

    #[test]
    fn test_success_passes_arguments() {
        let temp = TempDir::new().unwrap();
        let tool = fake_tool(temp.path(), "touch \"$4\"");
        let output = temp.path().join("out.deb");

        DpkgDeb::new(tool)
            .archive(temp.path(), &output, &CancellationToken::new())
            .unwrap();
        assert!(output.exists());
    }

    #[test]
    fn test_failure_carries_code_and_stderr() {
        let temp = TempDir::new().unwrap();
        let tool = fake_tool(temp.path(), "echo 'bad control file' >&2\nexit 2");

        let err = DpkgDeb::new(tool)
            .archive(temp.path(), &temp.path().join("out.deb"), &CancellationToken::new())
            .unwrap_err();
        match err {
            BuildError::ArchiverFailed { code, stderr, .. } => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "bad control file\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancel_kills_running_tool() {
        let temp = TempDir::new().unwrap();
        let tool = fake_tool(temp.path(), "exec sleep 30");
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            remote.cancel();
        });

        let started = Instant::now();
        let err = DpkgDeb::new(tool)
            .archive(temp.path(), &temp.path().join("out.deb"), &token)
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, BuildError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = DpkgDeb::new("/nonexistent/safedeb-archiver")
            .archive(temp.path(), &temp.path().join("out.deb"), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::Io(_)));
    }
}
