//! Deferred symlink queue.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::SymlinkManager;
use crate::BuildError;
use crate::Result;
use crate::security::PathMapper;
use crate::security::PathValidator;
use crate::types::clean_path;

/// Description used for requests discovered while walking a source tree.
pub const AUTO_DESCRIPTION: &str = "Automatically detected during build";

/// A symlink to create at `target`, pointing to `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymlinkRequest {
    /// Isolated location the link points to.
    pub source: PathBuf,
    /// Conventional location where the link is created.
    pub target: PathBuf,
    /// Free-form note carried into logs and generated scripts.
    pub description: String,
}

impl SymlinkRequest {
    /// Creates a request.
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            description: description.into(),
        }
    }
}

/// Collects symlink requests during a build and creates them later.
///
/// The queue is guarded by a mutex so `queue` and `process_path` may be
/// called from several threads; no two queued requests share a target.
///
/// # Examples
///
/// ```
/// use safedeb_core::security::{PathMapper, PathValidator};
/// use safedeb_core::symlink::{SymlinkManager, SymlinkProcessor};
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = SymlinkProcessor::new(
///     PathMapper::default(),
///     SymlinkManager::new(Vec::new()),
///     PathValidator::default(),
/// );
///
/// let queued = processor.process_path(
///     Path::new("/usr/share/applications/safedeb-doc-example.desktop"),
///     None,
/// )?;
/// assert!(queued);
/// assert_eq!(processor.len(), 1);
/// assert_eq!(
///     processor.snapshot()[0].source,
///     Path::new("/opt/usr/share/applications/safedeb-doc-example.desktop")
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SymlinkProcessor {
    mapper: PathMapper,
    manager: SymlinkManager,
    validator: PathValidator,
    queue: Mutex<Vec<SymlinkRequest>>,
    dry_run: bool,
}

impl SymlinkProcessor {
    /// Creates an empty processor.
    #[must_use]
    pub fn new(mapper: PathMapper, manager: SymlinkManager, validator: PathValidator) -> Self {
        Self {
            mapper,
            manager,
            validator,
            queue: Mutex::new(Vec::new()),
            dry_run: false,
        }
    }

    /// In dry-run mode `flush` only logs what it would create.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Returns `true` in dry-run mode.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SymlinkRequest>> {
        // The queue holds plain data, so a poisoned lock is still consistent.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `request` and appends it to the queue.
    ///
    /// # Errors
    ///
    /// - any path or traversal error for source or target
    /// - any [`PathValidator::validate_symlink`] error
    /// - [`BuildError::DuplicateSymlinkTarget`] when the target is queued
    pub fn queue(&self, request: SymlinkRequest) -> Result<()> {
        self.validator.validate_path_traversal(&request.source)?;
        self.validator.validate_path_traversal(&request.target)?;
        self.validator
            .validate_symlink(&request.source, &request.target)?;

        let mut queue = self.lock();
        if queue.iter().any(|queued| queued.target == request.target) {
            return Err(BuildError::DuplicateSymlinkTarget {
                target: request.target,
            });
        }
        debug!(
            source = %request.source.display(),
            target = %request.target.display(),
            description = %request.description,
            "queued symlink"
        );
        queue.push(request);
        Ok(())
    }

    /// Queues a link for `original` when the mapper says one is needed.
    ///
    /// The link points at `transformed` when given, otherwise at the
    /// mapper's result for `original`. Returns whether a request was queued.
    ///
    /// # Errors
    ///
    /// Transformation errors and any [`queue`](Self::queue) error.
    pub fn process_path(&self, original: &Path, transformed: Option<&Path>) -> Result<bool> {
        let mapped = self.mapper.transform(original)?;
        if !mapped.needs_symlink {
            return Ok(false);
        }
        let source = transformed.map_or(mapped.path, Path::to_path_buf);
        self.queue(SymlinkRequest::new(
            source,
            clean_path(original),
            AUTO_DESCRIPTION,
        ))?;
        Ok(true)
    }

    /// Creates every queued symlink and clears the queue.
    ///
    /// Processing continues past individual failures. The parent directory
    /// of each target is created when missing. Returns the number of
    /// requests handled.
    ///
    /// # Errors
    ///
    /// [`BuildError::SymlinkFlushFailed`] when at least one request failed.
    pub fn flush(&self) -> Result<usize> {
        let pending = std::mem::take(&mut *self.lock());
        if pending.is_empty() {
            debug!("no symlinks to process");
            return Ok(0);
        }

        let total = pending.len();
        let mut failed = 0;
        for request in &pending {
            if self.dry_run {
                info!(
                    source = %request.source.display(),
                    target = %request.target.display(),
                    "dry run: would create symlink"
                );
                continue;
            }
            if let Err(err) = self.create(request) {
                warn!(
                    source = %request.source.display(),
                    target = %request.target.display(),
                    error = %err,
                    "failed to create symlink"
                );
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(BuildError::SymlinkFlushFailed { failed, total });
        }
        Ok(total)
    }

    fn create(&self, request: &SymlinkRequest) -> Result<()> {
        if let Some(parent) = request.target.parent() {
            fs::create_dir_all(parent)?;
        }
        self.manager
            .create_symlink(&request.source, &request.target)?;
        debug!(
            source = %request.source.display(),
            target = %request.target.display(),
            "created symlink"
        );
        Ok(())
    }

    /// Independent copy of the queued requests.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SymlinkRequest> {
        self.lock().clone()
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The mapper used by [`process_path`](Self::process_path).
    #[must_use]
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// The validator applied to every request.
    #[must_use]
    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    /// The manager used by [`flush`](Self::flush).
    #[must_use]
    pub fn manager(&self) -> &SymlinkManager {
        &self.manager
    }
}
