//! Ongoing operation tracking.
//!
//! Tracks whether a single online operation is in flight and exposes the
//! answer as an observable flag. UI code subscribes to the flag to disable
//! interaction while a request is outstanding.

#![warn(missing_docs)]

pub mod config;
pub mod scope;
pub mod tracker;

pub use config::{ConfigError, TrackerConfig};
pub use scope::OperationScope;
pub use tracker::{OperationTracker, Result, TrackerError};

pub use optrack_core::{Observable, OperationId, OperationInfo, SubscriptionId, ValueChange};
