//! Scoped operations.

use optrack_core::OperationId;

use crate::tracker::OperationTracker;

/// An open operation that ends when dropped.
///
/// Created by [`OperationTracker::begin_scoped`].
#[derive(Debug)]
#[must_use = "dropping the scope ends the operation immediately"]
pub struct OperationScope<'a> {
    tracker: &'a mut OperationTracker,
    id: OperationId,
}

impl<'a> OperationScope<'a> {
    pub(crate) fn new(tracker: &'a mut OperationTracker, id: OperationId) -> Self {
        Self { tracker, id }
    }

    /// Identifier of the scoped operation.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// End the operation now.
    pub fn end(self) {}
}

impl Drop for OperationScope<'_> {
    fn drop(&mut self) {
        self.tracker.end_operation();
    }
}
