//! Package builder.
//!
//! A [`Builder`] owns one build: it walks the source tree, stages every
//! entry at its transformed path, turns deferred symlinks into a post-install
//! script, audits the staging tree and hands it to an [`Archiver`].
//!
//! The staging directory is a [`TempDir`] owned by the builder, so it is
//! removed whenever the builder is dropped: after success, failure,
//! cancellation or timeout.

pub mod archiver;
pub mod cancel;
pub mod copy;
pub mod report;

pub use archiver::Archiver;
pub use archiver::DpkgDeb;
pub use cancel::CancellationToken;
pub use report::BuildReport;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tempfile::TempDir;
use tracing::debug;
use tracing::info;
use tracing::warn;
use walkdir::WalkDir;

use crate::BuildError;
use crate::BuilderConfig;
use crate::Result;
use crate::SymlinkFailurePolicy;
use crate::package::MaintainerScript;
use crate::package::PackageMetadata;
use crate::package::installed_size_kb;
use crate::security::PathMapper;
use crate::security::PathValidator;
use crate::security::ScriptValidationResult;
use crate::security::ScriptValidator;
use crate::security::rules::CONTROL_DIR;
use crate::symlink::SymlinkManager;
use crate::symlink::SymlinkProcessor;
use crate::symlink::merge_into_script;
use crate::symlink::render_symlink_block;
use crate::symlink::render_symlink_script;
use crate::types::clean_path;
use copy::CopyBuffer;
use copy::copy_with_buffer;

/// Prefix of the staging directory name.
const STAGING_PREFIX: &str = "safedeb-build-";

/// Lifecycle of a single build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Created,
    Walking,
    AwaitingSymlinkScript,
    Auditing,
    Archiving,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Walking => "walking",
            Self::AwaitingSymlinkScript => "awaiting-symlink-script",
            Self::Auditing => "auditing",
            Self::Archiving => "archiving",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Builds one Debian package from a source tree.
///
/// # Examples
///
/// ```no_run
/// use safedeb_core::{Builder, BuilderConfig, MaintainerScript, PackageMetadata};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let metadata = PackageMetadata::new("hello", "1.0.0")
///     .with_maintainer("Jane Doe <jane@example.com>");
///
/// let mut builder = Builder::new("./pkgroot", "./dist", metadata, BuilderConfig::default())?;
/// builder.set_maintainer_script(MaintainerScript::PostInst, "#!/bin/sh\necho installed\n")?;
///
/// let report = builder.build()?;
/// println!("built {}", report.output_path.display());
/// # Ok(())
/// # }
/// ```
pub struct Builder {
    source_dir: PathBuf,
    output_dir: PathBuf,
    metadata: PackageMetadata,
    config: BuilderConfig,
    mapper: PathMapper,
    validator: PathValidator,
    script_validator: ScriptValidator,
    processor: SymlinkProcessor,
    archiver: Box<dyn Archiver>,
    scripts: BTreeMap<MaintainerScript, String>,
    staging: TempDir,
    cancel: CancellationToken,
    report: BuildReport,
    state: BuildState,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("source_dir", &self.source_dir)
            .field("output_dir", &self.output_dir)
            .field("package", &self.metadata.name)
            .field("archiver", &self.archiver.name())
            .field("staging", &self.staging.path())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Prepares a build of `source_dir` into `output_dir`.
    ///
    /// Creates `output_dir` when missing and allocates a fresh staging
    /// directory, below `options.staging_parent` when set.
    ///
    /// # Errors
    ///
    /// - [`BuildError::SourceNotFound`] when `source_dir` is not a directory
    /// - [`BuildError::InvalidPattern`] for a bad extra script pattern
    /// - [`BuildError::Io`] when the output or staging directory cannot be
    ///   created
    pub fn new(
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        metadata: PackageMetadata,
        config: BuilderConfig,
    ) -> Result<Self> {
        let source_dir = source_dir.into();
        let output_dir = output_dir.into();
        if !source_dir.is_dir() {
            return Err(BuildError::SourceNotFound { path: source_dir });
        }
        fs::create_dir_all(&output_dir)?;

        let mut staging = tempfile::Builder::new();
        staging.prefix(STAGING_PREFIX);
        let staging = match &config.options.staging_parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                staging.tempdir_in(parent)?
            }
            None => staging.tempdir()?,
        };

        let mapper = PathMapper::new(&config.mapper);
        let validator = PathValidator::new(config.security.clone());
        let script_validator =
            ScriptValidator::new(&config.effective_script_policy())?.with_mapper(mapper.clone());
        let manager = SymlinkManager::new(config.mapper.symlink_dirs.clone());
        let processor = SymlinkProcessor::new(mapper.clone(), manager, validator.clone());

        debug!(
            source = %source_dir.display(),
            output = %output_dir.display(),
            staging = %staging.path().display(),
            "created builder"
        );

        Ok(Self {
            source_dir,
            output_dir,
            metadata,
            config,
            mapper,
            validator,
            script_validator,
            processor,
            archiver: Box::new(DpkgDeb::default()),
            scripts: BTreeMap::new(),
            staging,
            cancel: CancellationToken::new(),
            report: BuildReport::new(),
            state: BuildState::Created,
        })
    }

    /// Replaces the archiver (`dpkg-deb` by default).
    #[must_use]
    pub fn with_archiver(mut self, archiver: impl Archiver + 'static) -> Self {
        self.archiver = Box::new(archiver);
        self
    }

    /// Validates `content` and stores it in `slot`.
    ///
    /// With `ignore_script_validation` a rejected script is still stored;
    /// the override is logged and every finding is copied into the report's
    /// warnings.
    ///
    /// # Errors
    ///
    /// [`BuildError::ScriptRejected`] when the script fails validation and
    /// the override is off.
    pub fn set_maintainer_script(
        &mut self,
        slot: MaintainerScript,
        content: impl Into<String>,
    ) -> Result<ScriptValidationResult> {
        let content = content.into();
        let result = self.script_validator.validate(slot.file_name(), &content);
        if !result.valid {
            self.force_accept(slot, &result)?;
        }
        self.scripts.insert(slot, content);
        Ok(result)
    }

    fn force_accept(&mut self, slot: MaintainerScript, result: &ScriptValidationResult) -> Result<()> {
        if !self.config.options.ignore_script_validation {
            return Err(result.to_rejection());
        }
        warn!(
            script = %slot,
            assessment = %result.assessment(),
            "script failed validation, accepting because validation is ignored"
        );
        if !self.report.forced_scripts.contains(&slot) {
            self.report.forced_scripts.push(slot);
        }
        for issue in result.errors.iter().chain(&result.warnings) {
            self.report.add_warning(format!("{slot}: {issue}"));
        }
        Ok(())
    }

    /// Token observed by the walk, the copy loop and the archiver.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Staging directory of this build.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// The metadata being packaged.
    #[must_use]
    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// Runs the build to completion.
    ///
    /// # Errors
    ///
    /// The first fatal error of the walk, script, audit or archive stage.
    pub fn build(mut self) -> Result<BuildReport> {
        let started = Instant::now();
        match self.run() {
            Ok(()) => {
                self.transition(BuildState::Done);
                self.report.duration = started.elapsed();
                info!(
                    output = %self.report.output_path.display(),
                    files = self.report.files_copied,
                    deferred_symlinks = self.report.deferred_symlinks.len(),
                    "package built"
                );
                Ok(self.report)
            }
            Err(err) => {
                self.transition(BuildState::Failed);
                warn!(error = %err, "package build failed");
                Err(err)
            }
        }
    }

    /// Runs the build on a worker thread and gives up after `timeout`.
    ///
    /// On expiry the build is cancelled and joined. The worker stops at its
    /// next checkpoint and removes the staging directory before this returns.
    ///
    /// # Errors
    ///
    /// [`BuildError::Timeout`], or any error of [`build`](Self::build).
    pub fn build_with_timeout(self, timeout: Duration) -> Result<BuildReport> {
        let cancel = self.cancel.clone();
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("safedeb-build".to_string())
            .spawn(move || {
                let _ = tx.send(self.build());
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let _ = worker.join();
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "build timed out, cancelling");
                cancel.cancel();
                let _ = worker.join();
                // The build may have finished between the timeout and the cancel.
                match rx.try_recv() {
                    Ok(Ok(report)) => Ok(report),
                    _ => Err(BuildError::Timeout { timeout }),
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                Err(BuildError::Io(io::Error::other("build worker exited without a result")))
            }
        }
    }

    fn transition(&mut self, next: BuildState) {
        debug!(from = %self.state, to = %next, "build state");
        self.state = next;
    }

    fn run(&mut self) -> Result<()> {
        self.metadata.validate()?;

        self.transition(BuildState::Walking);
        self.walk()?;

        if !self.processor.is_empty() {
            self.transition(BuildState::AwaitingSymlinkScript);
            self.attach_symlink_script()?;
        }

        self.write_control_dir()?;

        self.transition(BuildState::Auditing);
        self.validator.validate_package(self.staging.path())?;

        self.cancel.check()?;
        self.transition(BuildState::Archiving);
        let output = self.output_dir.join(self.metadata.output_file_name());
        info!(
            archiver = self.archiver.name(),
            output = %output.display(),
            "archiving package"
        );
        self.archiver
            .archive(self.staging.path(), &output, &self.cancel)?;
        self.report.output_path = output;
        Ok(())
    }

    /// Location of install path `path` inside the staging tree.
    fn staged(&self, path: &Path) -> PathBuf {
        self.staging
            .path()
            .join(path.strip_prefix("/").unwrap_or(path))
    }

    fn walk(&mut self) -> Result<()> {
        let mut buffer = CopyBuffer::new();
        let source = self.source_dir.clone();
        let excludes = self.config.options.exclude_dirs.clone();

        let walker = WalkDir::new(&source)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded(&source, entry.path(), &excludes));

        for entry in walker {
            self.cancel.check()?;
            let entry = entry.map_err(|e| io::Error::other(format!("walkdir error: {e}")))?;
            let Ok(relative) = entry.path().strip_prefix(&source) else {
                continue;
            };
            let install_path = Path::new("/").join(relative);

            let transformed = self.mapper.transform(&install_path)?;
            self.validator.validate_path(&transformed.path)?;
            self.validator.validate_path_traversal(&transformed.path)?;

            let file_type = entry.file_type();
            // Directories are never linked as a whole; their entries are.
            if transformed.needs_symlink
                && !file_type.is_dir()
                && !self.config.options.disable_symlinks
            {
                self.defer_symlink(&install_path, &transformed.path)?;
            }

            let dest = self.staged(&transformed.path);
            if file_type.is_dir() {
                self.stage_dir(entry.path(), &dest)?;
            } else if file_type.is_file() {
                self.stage_file(entry.path(), &dest, &mut buffer)?;
            } else if file_type.is_symlink() {
                self.stage_symlink(entry.path(), &install_path, &dest)?;
            } else {
                warn!(path = %entry.path().display(), "skipping special file");
            }
        }

        self.report.installed_size_kb = installed_size_kb(self.report.bytes_copied);
        debug!(
            files = self.report.files_copied,
            directories = self.report.directories_created,
            symlinks = self.report.symlinks_recreated,
            bytes = self.report.bytes_copied,
            "walk finished"
        );
        Ok(())
    }

    fn defer_symlink(&mut self, original: &Path, transformed: &Path) -> Result<()> {
        match self.processor.process_path(original, Some(transformed)) {
            Ok(_) => Ok(()),
            Err(err) => match self.config.options.effective_symlink_failure() {
                SymlinkFailurePolicy::FailFast => Err(err),
                SymlinkFailurePolicy::BestEffort => {
                    warn!(
                        path = %original.display(),
                        error = %err,
                        "symlink not deferred, continuing"
                    );
                    self.report.add_warning(format!(
                        "symlink for {} not deferred: {err}",
                        original.display()
                    ));
                    Ok(())
                }
            },
        }
    }

    fn stage_dir(&mut self, source: &Path, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Owner keeps rwx so the walk can populate the directory.
            let mode = (fs::metadata(source)?.permissions().mode() & 0o777) | 0o700;
            fs::set_permissions(dest, fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = source;
        self.report.directories_created += 1;
        Ok(())
    }

    fn stage_file(&mut self, source: &Path, dest: &Path, buffer: &mut CopyBuffer) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut reader = File::open(source)?;
        let mut writer = File::create(dest)?;
        let copied = copy_with_buffer(&mut reader, &mut writer, buffer, &self.cancel)?;
        drop(writer);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let source_mode = reader.metadata()?.permissions().mode();
            let mode = staged_file_mode(source_mode, self.config.options.preserve_permissions);
            if source_mode & 0o7000 != 0 {
                warn!(path = %source.display(), "dropping setuid/setgid/sticky bits");
            }
            fs::set_permissions(dest, fs::Permissions::from_mode(mode))?;
        }

        self.report.files_copied += 1;
        self.report.bytes_copied = self.report.bytes_copied.saturating_add(copied);
        Ok(())
    }

    /// Recreates a source-tree symlink, pointing it into the secure root.
    ///
    /// Relative targets are resolved against the link's install directory.
    /// The resolved target must pass the traversal check; it is then mapped
    /// through the path mapper, and kept as-is when no rule covers it.
    fn stage_symlink(&mut self, source: &Path, install_path: &Path, dest: &Path) -> Result<()> {
        let link = fs::read_link(source)?;
        let resolved = if link.is_absolute() {
            link.clone()
        } else {
            let parent = install_path.parent().unwrap_or_else(|| Path::new("/"));
            clean_path(&parent.join(&link))
        };
        self.validator.validate_path_traversal(&resolved)?;

        let target = match self.mapper.transform(&resolved) {
            Ok(mapped) => mapped.path,
            Err(BuildError::NoRuleMatched { .. }) => {
                self.validator.validate_path(&resolved)?;
                resolved
            }
            Err(err) => return Err(err),
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        create_staged_link(&target, dest)?;
        debug!(
            link = %install_path.display(),
            original_target = %link.display(),
            target = %target.display(),
            "recreated symlink"
        );
        self.report.symlinks_recreated += 1;
        Ok(())
    }

    fn attach_symlink_script(&mut self) -> Result<()> {
        let deferred = self.processor.snapshot();
        let postinst = match self.scripts.get(&MaintainerScript::PostInst) {
            Some(user) => merge_into_script(user, &render_symlink_block(&deferred)),
            None => render_symlink_script(&deferred),
        };

        // The shipped text is what counts: risks of the user script and the
        // generated block add up.
        let result = self
            .script_validator
            .validate(MaintainerScript::PostInst.file_name(), &postinst);
        if !result.valid {
            self.force_accept(MaintainerScript::PostInst, &result)?;
        }
        self.scripts.insert(MaintainerScript::PostInst, postinst);

        info!(count = deferred.len(), "deferred symlinks to post-install script");
        self.report.deferred_symlinks = deferred;
        Ok(())
    }

    fn write_control_dir(&mut self) -> Result<()> {
        self.cancel.check()?;
        let control_dir = self.staging.path().join(CONTROL_DIR);
        fs::create_dir_all(&control_dir)?;
        set_mode(&control_dir, 0o755)?;

        let control = control_dir.join("control");
        fs::write(
            &control,
            self.metadata.render_control(self.report.installed_size_kb),
        )?;
        set_mode(&control, 0o644)?;

        for (slot, content) in &self.scripts {
            let path = control_dir.join(slot.file_name());
            fs::write(&path, content)?;
            set_mode(&path, 0o755)?;
            debug!(script = %slot, "wrote maintainer script");
        }
        Ok(())
    }
}

/// Exclusions are source-relative, or absolute paths inside the source.
fn is_excluded(source: &Path, path: &Path, excludes: &[PathBuf]) -> bool {
    excludes.iter().any(|exclude| {
        if exclude.is_absolute() {
            path.starts_with(exclude)
        } else {
            path.strip_prefix(source)
                .is_ok_and(|relative| relative.starts_with(exclude))
        }
    })
}

/// Mode of a staged regular file: normalized to 0644, or 0755 when any
/// execute bit is set, unless permissions are preserved.
#[cfg(unix)]
fn staged_file_mode(source_mode: u32, preserve: bool) -> u32 {
    if preserve {
        source_mode & 0o777
    } else if source_mode & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_staged_link(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_staged_link(target: &Path, link: &Path) -> Result<()> {
    warn!(
        link = %link.display(),
        target = %target.display(),
        "symlinks are not supported on this platform, skipping"
    );
    Ok(())
}
