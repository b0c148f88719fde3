//! Observable state cell with synchronous change notification.
//!
//! A [`Bindable`] owns a value and a registry of change callbacks. Readers
//! get an [`Observable`], which shares the same cell but cannot write to it.
//! While a [`Lease`] is held, the lease is the only writer.
//!
//! Dropping the [`Bindable`] clears its callbacks. Observers that outlive it
//! keep reading the last value but are never notified again.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::id::SubscriptionId;
use crate::lease::Lease;

/// Result type for bindable operations.
pub type Result<T> = std::result::Result<T, BindableError>;

/// Errors that can occur when writing to a bindable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindableError {
    /// A direct write was attempted while a lease is held
    #[error("Cannot change value while it is leased")]
    Leased,

    /// A second lease was requested while one is held
    #[error("Value is already leased")]
    AlreadyLeased,
}

/// Payload delivered to subscribers when a value actually changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChange<T> {
    /// Value before the change
    pub old: T,

    /// Value after the change
    pub new: T,
}

type Callback<T> = Arc<dyn Fn(&ValueChange<T>) + Send + Sync>;

pub(crate) struct CellState<T> {
    pub(crate) value: T,
    pub(crate) leased: bool,
    next_subscription: u64,
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
}

/// Handle to the cell shared by a bindable, its observers and its lease.
pub(crate) struct Shared<T> {
    cell: Arc<Mutex<CellState<T>>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Shared<T> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, CellState<T>> {
        // Callbacks run outside the lock, so a poisoned mutex still holds a
        // consistent value.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + PartialEq> Shared<T> {
    pub(crate) fn value(&self) -> T {
        self.lock().value.clone()
    }

    fn is_leased(&self) -> bool {
        self.lock().leased
    }

    fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.subscribers.push((id, Arc::new(callback)));
        tracing::trace!(subscription = %id, "Subscribed");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sub, _)| *sub != id);
        let removed = state.subscribers.len() != before;
        if removed {
            tracing::trace!(subscription = %id, "Unsubscribed");
        }
        removed
    }

    /// Store `new` and notify subscribers once the lock is dropped.
    pub(crate) fn apply(mut state: MutexGuard<'_, CellState<T>>, new: T) {
        if state.value == new {
            return;
        }

        let old = std::mem::replace(&mut state.value, new.clone());
        let callbacks: Vec<Callback<T>> = state
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        drop(state);

        let change = ValueChange { old, new };
        for callback in callbacks {
            callback(&change);
        }
    }
}

/// A writable value that notifies subscribers on change.
///
/// The bindable is the single owner of its callback registry; see the
/// module docs for what happens when it is dropped.
pub struct Bindable<T> {
    shared: Shared<T>,
}

impl<T: Clone + PartialEq> Bindable<T> {
    /// Create a new bindable holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            shared: Shared {
                cell: Arc::new(Mutex::new(CellState {
                    value,
                    leased: false,
                    next_subscription: 0,
                    subscribers: Vec::new(),
                })),
            },
        }
    }

    /// Current value.
    pub fn value(&self) -> T {
        self.shared.value()
    }

    /// Whether a lease is currently held.
    pub fn is_leased(&self) -> bool {
        self.shared.is_leased()
    }

    /// Set the value, notifying subscribers if it changed.
    ///
    /// Fails with [`BindableError::Leased`] while a lease is held.
    pub fn set(&self, value: T) -> Result<()> {
        let state = self.shared.lock();
        if state.leased {
            return Err(BindableError::Leased);
        }
        Shared::apply(state, value);
        Ok(())
    }

    /// Take exclusive write ownership of the value.
    ///
    /// With `revert_on_release`, the value captured now is restored when the
    /// lease is released.
    pub fn begin_lease(&self, revert_on_release: bool) -> Result<Lease<T>> {
        let original = {
            let mut state = self.shared.lock();
            if state.leased {
                return Err(BindableError::AlreadyLeased);
            }
            state.leased = true;
            state.value.clone()
        };

        tracing::trace!(revert_on_release, "Lease acquired");
        Ok(Lease::new(self.shared.clone(), revert_on_release.then_some(original)))
    }

    /// Register a callback invoked synchronously on every change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.shared.subscribe(callback)
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.unsubscribe(id)
    }

    /// Read-only view of this bindable.
    pub fn observe(&self) -> Observable<T> {
        Observable {
            shared: self.shared.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers.len()
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> std::sync::Weak<Mutex<CellState<T>>> {
        Arc::downgrade(&self.shared.cell)
    }
}

impl<T> Drop for Bindable<T> {
    fn drop(&mut self) {
        // Callbacks may hold observers of this cell; dropping them breaks the
        // cycle. They are dropped after the lock is released.
        let subscribers = std::mem::take(&mut self.shared.lock().subscribers);
        drop(subscribers);
    }
}

impl<T: Clone + PartialEq + Default> Default for Bindable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Cell")
            .field("value", &state.value)
            .field("leased", &state.leased)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl<T: fmt::Debug> fmt::Debug for Bindable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Bindable").field(&self.shared).finish()
    }
}

/// Read-only view of a [`Bindable`].
///
/// Clones share the same underlying cell.
pub struct Observable<T> {
    shared: Shared<T>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    /// Current value.
    pub fn value(&self) -> T {
        self.shared.value()
    }

    /// Whether the underlying value is currently leased.
    pub fn is_leased(&self) -> bool {
        self.shared.is_leased()
    }

    /// Register a callback invoked synchronously on every change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ValueChange<T>) + Send + Sync + 'static,
    {
        self.shared.subscribe(callback)
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.unsubscribe(id)
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable").field(&self.shared).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + 'static>() -> (
        Arc<Mutex<Vec<ValueChange<T>>>>,
        impl Fn(&ValueChange<T>) + Send + Sync + 'static,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |change: &ValueChange<T>| {
            sink.lock().unwrap().push(change.clone())
        })
    }

    #[test]
    fn test_bindable_new() {
        let bindable = Bindable::new(3);
        assert_eq!(bindable.value(), 3);
        assert!(!bindable.is_leased());
        assert_eq!(bindable.subscriber_count(), 0);
    }

    #[test]
    fn test_set_notifies_with_old_and_new() {
        let bindable = Bindable::new(false);
        let (seen, callback) = recorder::<bool>();
        bindable.subscribe(callback);

        bindable.set(true).unwrap();

        assert!(bindable.value());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ValueChange { old: false, new: true }]
        );
    }

    #[test]
    fn test_set_same_value_is_silent() {
        let bindable = Bindable::new(1);
        let (seen, callback) = recorder::<i32>();
        bindable.subscribe(callback);

        bindable.set(1).unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_subscribers_notified_in_order() {
        let bindable = Bindable::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            bindable.subscribe(move |_| order.lock().unwrap().push(tag));
        }

        bindable.set(5).unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe() {
        let bindable = Bindable::new(0);
        let (seen, callback) = recorder::<i32>();
        let id = bindable.subscribe(callback);

        assert!(bindable.unsubscribe(id));
        assert!(!bindable.unsubscribe(id));
        bindable.set(1).unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(bindable.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_can_read_value() {
        let bindable = Bindable::new(false);
        let reader = bindable.observe();
        let read = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&read);
        bindable.subscribe(move |_| sink.lock().unwrap().push(reader.value()));

        bindable.set(true).unwrap();

        assert_eq!(*read.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_drop_frees_cell_held_by_callback() {
        let bindable = Bindable::new(false);
        let cell = bindable.downgrade();
        let reader = bindable.observe();
        bindable.subscribe(move |_| {
            reader.value();
        });
        assert_eq!(bindable.subscriber_count(), 1);

        drop(bindable);

        assert!(cell.upgrade().is_none());
    }

    #[test]
    fn test_observer_outlives_bindable() {
        let bindable = Bindable::new(1);
        let observer = bindable.observe();
        let (seen, callback) = recorder::<i32>();
        observer.subscribe(callback);
        bindable.set(2).unwrap();

        drop(bindable);

        assert_eq!(observer.value(), 2);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_observable_shares_cell() {
        let bindable = Bindable::new("idle".to_string());
        let observable = bindable.observe();
        let (seen, callback) = recorder::<String>();
        observable.subscribe(callback);

        bindable.set("busy".to_string()).unwrap();

        assert_eq!(observable.value(), "busy");
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(observable.clone().value(), "busy");
    }

    #[test]
    fn test_set_rejected_while_leased() {
        let bindable = Bindable::new(false);
        let _lease = bindable.begin_lease(false).unwrap();

        assert_eq!(bindable.set(true), Err(BindableError::Leased));
        assert!(!bindable.value());
        assert!(bindable.observe().is_leased());
    }

    #[test]
    fn test_value_change_serializes() {
        let change = ValueChange { old: false, new: true };
        let json = serde_json::to_string(&change).unwrap();
        assert_eq!(json, r#"{"old":false,"new":true}"#);
    }
}
