//! OpTrack core primitives.
//!
//! This crate defines the observable state cell and the exclusive write
//! lease that the operation tracker is built on.

#![warn(missing_docs)]

// Core identities
mod id;

// Observable state
mod bindable;
mod lease;

// Operation metadata
mod operation;

// Re-exports
pub use id::*;

pub use bindable::{Bindable, BindableError, Observable, ValueChange};
pub use lease::Lease;
pub use operation::OperationInfo;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
