//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::BuildError;
use crate::Result;

/// Shared flag checked at every build checkpoint.
///
/// Clones observe the same flag. Cancellation is one-way.
///
/// # Examples
///
/// ```
/// use safedeb_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker = token.clone();
/// assert!(worker.check().is_ok());
///
/// token.cancel();
/// assert!(worker.is_cancelled());
/// assert!(worker.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint: fails with [`BuildError::Cancelled`] after cancellation.
    ///
    /// # Errors
    ///
    /// [`BuildError::Cancelled`].
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(BuildError::Cancelled)));
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || remote.cancel());
        assert!(handle.join().is_ok());
        assert!(token.is_cancelled());
    }
}
