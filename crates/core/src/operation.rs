//! Metadata describing an open operation.

use crate::id::OperationId;
use crate::Time;
use serde::{Deserialize, Serialize};

/// The operation currently holding the in-progress flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Unique identifier
    pub id: OperationId,

    /// When the operation began
    pub started_at: Time,
}

impl OperationInfo {
    /// Describe an operation starting now.
    pub fn start() -> Self {
        Self {
            id: OperationId::new(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Time since the operation began.
    pub fn elapsed(&self) -> chrono::Duration {
        chrono::Utc::now() - self.started_at
    }
}
