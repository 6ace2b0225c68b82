//! Synchronization record types
//!
//! These types represent the metadata database schema and are used by the
//! repository ports.

use serde::{Deserialize, Serialize};

use super::commerce::EntityKind;

/// RemoteLink - persisted mapping from a local entity id to its counterpart
/// in the remote workspace. Absence of a link means "not yet synced".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    pub entity_kind: EntityKind,
    pub local_id: i64,
    pub remote_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Bulk operation kind carried by a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Force-resync a list of orders (fingerprints cleared first)
    OrdersSync,
    /// Delete a list of orders from the remote workspace
    OrdersDelete,
}

crate::impl_domain_status_conversions!(TaskKind {
    OrdersSync => "orders_sync",
    OrdersDelete => "orders_delete"
});

/// Background task processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Processed,
    Failed,
}

crate::impl_domain_status_conversions!(TaskStatus {
    Queued => "queued",
    Processing => "processing",
    Processed => "processed",
    Failed => "failed"
});

impl TaskStatus {
    /// Whether a task in this status will never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }

    /// Status transitions are monotonic: queued -> processing -> processed,
    /// or -> failed; a status never regresses.
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Processing | Self::Failed),
            Self::Processing => matches!(next, Self::Processed | Self::Failed),
            Self::Processed | Self::Failed => false,
        }
    }
}

/// BackgroundTask - a persisted bulk-operation job processed one at a time
/// by the queue driver. The id payload is immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundTask {
    pub id: i64,
    pub kind: TaskKind,
    /// Ordered list of local order ids to process
    pub entity_ids: Vec<i64>,
    pub status: TaskStatus,
    /// Orders that failed during processing; the task itself still ends
    /// `processed`, with the last failure message kept for diagnostics
    pub failed_count: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
