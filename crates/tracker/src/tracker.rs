//! Operation tracker.

use optrack_core::{Bindable, Lease, Observable, OperationId, OperationInfo};
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::scope::OperationScope;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that can occur while tracking operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// An operation was begun while another is still open. This is caller
    /// misuse: every begin must be paired with an end.
    #[error("Operation already in progress")]
    InvalidState {
        /// The operation that is still open, when the tracker knows it
        current: Option<OperationId>,
    },
}

/// Tracks whether an online operation is in progress.
///
/// At most one operation is open at a time. The flag returned by
/// [`observe_in_progress`](Self::observe_in_progress) reads `true` exactly
/// while one is open.
///
/// Transitions take `&mut self`; callers sharing a tracker across threads
/// must wrap it in their own mutex.
#[derive(Debug)]
pub struct OperationTracker {
    config: TrackerConfig,
    in_progress: Bindable<bool>,
    open: Option<OpenOperation>,
}

/// The guard held while an operation is open.
#[derive(Debug)]
struct OpenOperation {
    lease: Lease<bool>,
    info: OperationInfo,
}

impl OperationTracker {
    /// Create a tracker with the default config.
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// Create a tracker with the given config.
    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            config,
            in_progress: Bindable::new(false),
            open: None,
        }
    }

    /// Tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Read-only view of the in-progress flag.
    pub fn observe_in_progress(&self) -> Observable<bool> {
        self.in_progress.observe()
    }

    /// Whether an operation is open.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.value()
    }

    /// The open operation, if any.
    pub fn current_operation(&self) -> Option<&OperationInfo> {
        self.open.as_ref().map(|open| &open.info)
    }

    /// Begin tracking a new operation.
    ///
    /// Subscribers are notified of the change to `true` before this returns.
    /// Fails with [`TrackerError::InvalidState`] if an operation is already
    /// open, leaving the state untouched.
    pub fn begin_operation(&mut self) -> Result<OperationId> {
        if let Some(open) = &self.open {
            let current = open.info.id;
            warn!(
                label = %self.config.label,
                operation = %current,
                "Cannot begin operation while another is in progress"
            );
            return Err(TrackerError::InvalidState {
                current: Some(current),
            });
        }

        // The flag is only ever leased through `open`, so this cannot fail
        // while `open` is empty.
        let lease = self
            .in_progress
            .begin_lease(true)
            .map_err(|_| TrackerError::InvalidState { current: None })?;
        let info = OperationInfo::start();
        let id = info.id;

        lease.set(true);
        self.open = Some(OpenOperation { lease, info });

        if self.config.log_transitions {
            debug!(label = %self.config.label, operation = %id, "Operation started");
        }
        Ok(id)
    }

    /// Stop tracking the open operation.
    ///
    /// Does nothing if no operation is open. Otherwise subscribers are
    /// notified of the change to `false` before this returns, and the
    /// finished operation is handed back.
    pub fn end_operation(&mut self) -> Option<OperationInfo> {
        let OpenOperation { lease, info } = self.open.take()?;
        lease.release();

        if self.config.log_transitions {
            debug!(
                label = %self.config.label,
                operation = %info.id,
                elapsed_ms = info.elapsed().num_milliseconds(),
                "Operation ended"
            );
        }
        Some(info)
    }

    /// Begin an operation that ends when the returned scope is dropped.
    pub fn begin_scoped(&mut self) -> Result<OperationScope<'_>> {
        let id = self.begin_operation()?;
        Ok(OperationScope::new(self, id))
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        // Observers see the flag drop to `false` before the flag's callbacks
        // are released with `in_progress`.
        self.end_operation();
    }
}
