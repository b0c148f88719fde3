//! Exclusive write ownership of a bindable.

use std::fmt;

use crate::bindable::Shared;

/// Exclusive writer for a [`Bindable`](crate::Bindable).
///
/// While a lease exists, direct writes to the bindable fail and no other
/// lease can be taken. Releasing the lease, explicitly or by dropping it,
/// hands the value back.
#[must_use = "dropping a lease releases it immediately"]
pub struct Lease<T: Clone + PartialEq> {
    source: Shared<T>,
    revert_to: Option<T>,
    released: bool,
}

impl<T: Clone + PartialEq> Lease<T> {
    pub(crate) fn new(source: Shared<T>, revert_to: Option<T>) -> Self {
        Self {
            source,
            revert_to,
            released: false,
        }
    }

    /// Current value of the leased bindable.
    pub fn value(&self) -> T {
        self.source.value()
    }

    /// Set the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        Shared::apply(self.source.lock(), value);
    }

    /// Release the lease, restoring the captured value if requested.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // The lease flag and the reverted value change under one lock, so
        // subscribers never observe the bindable as leased after release.
        let mut state = self.source.lock();
        state.leased = false;
        match self.revert_to.take() {
            Some(original) => Shared::apply(state, original),
            None => drop(state),
        }
        tracing::trace!("Lease released");
    }
}

impl<T: Clone + PartialEq> Drop for Lease<T> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<T: Clone + PartialEq + fmt::Debug> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("source", &self.source)
            .field("revert_to", &self.revert_to)
            .field("released", &self.released)
            .finish()
    }
}
