//! Ports the sync services depend on.
//!
//! Implementations live in `storelink-infra`; tests substitute in-memory
//! fakes.

use async_trait::async_trait;
use serde_json::Value;
use storelink_domain::{
    ApiError, BackgroundTask, EntityKind, RemoteRecord, Result, TaskKind, TaskStatus,
};

/// Per-entity sync bookkeeping: the remote link and the change fingerprint.
///
/// Both values are keyed by `(entity kind, local id)` and are independent of
/// each other; clearing one never touches the other.
#[async_trait]
pub trait SyncMetadataRepository: Send + Sync {
    async fn get_remote_id(&self, kind: EntityKind, local_id: i64) -> Result<Option<String>>;

    async fn set_remote_id(&self, kind: EntityKind, local_id: i64, remote_id: &str) -> Result<()>;

    async fn clear_remote_id(&self, kind: EntityKind, local_id: i64) -> Result<()>;

    async fn get_fingerprint(&self, kind: EntityKind, local_id: i64) -> Result<Option<String>>;

    async fn set_fingerprint(&self, kind: EntityKind, local_id: i64, fingerprint: &str)
        -> Result<()>;

    async fn clear_fingerprint(&self, kind: EntityKind, local_id: i64) -> Result<()>;
}

/// Remote workspace CRUD, one collection per entity kind.
///
/// Implementations attach authentication and the webhook suppression
/// parameter themselves; callers only supply domain payloads.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    async fn create(&self, kind: EntityKind, payload: &Value) -> std::result::Result<RemoteRecord, ApiError>;

    async fn update(
        &self,
        kind: EntityKind,
        remote_id: &str,
        payload: &Value,
    ) -> std::result::Result<RemoteRecord, ApiError>;

    async fn delete(&self, kind: EntityKind, remote_id: &str) -> std::result::Result<(), ApiError>;

    /// Search a top-level collection with exact-match criteria.
    async fn search(
        &self,
        kind: EntityKind,
        criteria: &[(String, String)],
    ) -> std::result::Result<Vec<RemoteRecord>, ApiError>;

    /// Search the items nested under a specific remote order.
    async fn search_order_items(
        &self,
        order_remote_id: &str,
        criteria: &[(String, String)],
    ) -> std::result::Result<Vec<RemoteRecord>, ApiError>;
}

/// Durable queue of deferred bulk operations.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Persist a new task in the `Queued` state and return its id.
    async fn enqueue(&self, kind: TaskKind, entity_ids: &[i64]) -> Result<i64>;

    async fn get(&self, task_id: i64) -> Result<Option<BackgroundTask>>;

    /// Advance a task's status. Implementations reject transitions that
    /// [`TaskStatus::can_transition_to`] disallows.
    async fn set_status(&self, task_id: i64, status: TaskStatus) -> Result<()>;

    /// Record per-entity failures observed while a task was processed.
    async fn record_failures(
        &self,
        task_id: i64,
        failed_count: u32,
        last_error: Option<&str>,
    ) -> Result<()>;

    /// The oldest task still in the `Queued` state, if any.
    async fn next_queued(&self) -> Result<Option<BackgroundTask>>;
}
