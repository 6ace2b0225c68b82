//! The per-entity sync contract and helpers shared by its implementations.

use async_trait::async_trait;
use storelink_domain::constants::{
    EXTERNAL_SOURCE_INTEGRATION_FIELD, EXTERNAL_SOURCE_SYNC_ID_FIELD, LOOKUP_ITEMS_PER_PAGE,
};
use storelink_domain::RemoteRecord;

use crate::sync::errors::SyncResult;

/// One entity kind's push-side synchronization.
///
/// Implementations converge a single local record with its remote
/// counterpart: creating it when unlinked, updating it when its watched
/// fields changed, and healing the link when local and remote state have
/// drifted apart.
#[async_trait]
pub trait EntitySync: Send + Sync {
    /// Push the local record remotely, creating or updating as needed.
    /// `force` bypasses the change check on a linked record.
    async fn sync(&self, local_id: i64, force: bool) -> SyncResult<()>;

    /// Delete the remote counterpart. Local sync metadata is cleared even
    /// when the remote call fails.
    async fn delete(&self, local_id: i64) -> SyncResult<()>;

    /// Drop the local link and fingerprint, leaving the remote record in
    /// place.
    async fn unlink(&self, local_id: i64) -> SyncResult<()>;
}

/// Search criteria identifying the remote record that carries this local
/// entity's external source identity, capped to a single result.
pub(crate) fn identity_criteria(local_id: i64, integration: &str) -> Vec<(String, String)> {
    vec![
        (EXTERNAL_SOURCE_SYNC_ID_FIELD.to_string(), local_id.to_string()),
        (EXTERNAL_SOURCE_INTEGRATION_FIELD.to_string(), integration.to_string()),
        ("itemsPerPage".to_string(), LOOKUP_ITEMS_PER_PAGE.to_string()),
    ]
}

/// Adopt the remote id out of an identity lookup only when it returned
/// exactly one match. Zero matches means the conflict came from elsewhere;
/// more than one is ambiguous and must not be guessed at.
pub(crate) fn adopt_single_match(mut matches: Vec<RemoteRecord>) -> Option<String> {
    if matches.len() == 1 {
        matches.pop().map(|record| record.id)
    } else {
        None
    }
}
