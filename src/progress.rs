//! Progress reporting and cooperative cancellation.
//!
//! The core introduces no suspension points of its own; callers that want
//! cancellation or progress delivery pass a [`CancelToken`] and a
//! [`ProgressSink`]. The token is checked between files during backup and
//! restore and between phases during a panic. Cancellation during panic
//! phase 1 is ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, VaultError};

/// Cheap, clonable cancellation flag shared between a caller and a
/// long-running core operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns [`VaultError::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// [`VaultError::Cancelled`] once [`CancelToken::cancel`] has run.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(VaultError::Cancelled);
        }
        Ok(())
    }
}

/// A single progress observation emitted by a core operation.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    /// A named stage began (a panic phase, a restore state).
    Phase {
        /// Stage label.
        name: &'a str,
    },

    /// One entry out of a known total was processed.
    Entry {
        /// Entry name, relative to the operation's root.
        name: &'a str,
        /// Zero-based index of this entry.
        index: u64,
        /// Total number of entries.
        total: u64,
    },
}

/// Receiver for [`ProgressEvent`]s.
///
/// Implementations must be cheap and must not block; they run inline on
/// the operation's thread.
pub trait ProgressSink {
    /// Observes one event.
    fn report(&self, event: &ProgressEvent<'_>);
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: &ProgressEvent<'_>) {}
}
