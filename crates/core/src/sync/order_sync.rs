//! Order synchronization.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use storelink_domain::constants::{
    EXTERNAL_SOURCE_INTEGRATION_FIELD, EXTERNAL_SOURCE_SYNC_ID_FIELD,
};
use storelink_domain::{ApiError, EntityKind, Order};

use crate::commerce::ports::CommerceStore;
use crate::sync::changes::ChangesDetector;
use crate::sync::entity::{adopt_single_match, identity_criteria, EntitySync};
use crate::sync::errors::{SyncError, SyncResult};
use crate::sync::ports::{SyncMetadataRepository, WorkspaceApi};

pub struct OrderSync {
    api: Arc<dyn WorkspaceApi>,
    store: Arc<dyn CommerceStore>,
    metadata: Arc<dyn SyncMetadataRepository>,
    detector: ChangesDetector,
    integration: String,
}

impl OrderSync {
    pub fn new(
        api: Arc<dyn WorkspaceApi>,
        store: Arc<dyn CommerceStore>,
        metadata: Arc<dyn SyncMetadataRepository>,
        integration: String,
    ) -> Self {
        let detector = ChangesDetector::new(Arc::clone(&metadata));
        Self { api, store, metadata, detector, integration }
    }

    /// Watched field values, in the fixed order the fingerprint hashes them.
    fn watched_fields(order: &Order) -> Vec<String> {
        vec![
            order.number.clone(),
            order.status.clone(),
            order.email.clone(),
            order.total.to_string(),
        ]
    }

    fn create_payload(&self, order: &Order) -> Value {
        json!({
            "orderNumber": order.number,
            "status": order.status,
            "email": order.email,
            "total": order.total,
            EXTERNAL_SOURCE_SYNC_ID_FIELD: order.id.to_string(),
            EXTERNAL_SOURCE_INTEGRATION_FIELD: self.integration,
        })
    }

    /// Update payloads never resend the identity fields.
    fn update_payload(order: &Order) -> Value {
        json!({
            "orderNumber": order.number,
            "status": order.status,
            "email": order.email,
            "total": order.total,
        })
    }

    async fn note(&self, order: &Order, action: &str) {
        let note = format!("Order {} was {} in the remote workspace", order.number, action);
        if let Err(err) = self.store.add_order_note(order.id, &note).await {
            debug!(order_id = order.id, %err, "unable to record order audit note");
        }
    }
}

#[async_trait]
impl EntitySync for OrderSync {
    #[instrument(skip(self))]
    async fn sync(&self, local_id: i64, force: bool) -> SyncResult<()> {
        let order = self
            .store
            .order(local_id)
            .await
            .map_err(SyncError::from)?
            .ok_or_else(|| SyncError::InvalidArgument(format!("unable to find order {local_id}")))?;
        let fields = Self::watched_fields(&order);

        // One recovery attempt only: either adopting an existing remote
        // record after a duplicate-identity conflict, or recreating after
        // the linked record turned out to be gone.
        let mut recovered = false;
        loop {
            let linked = self.metadata.get_remote_id(EntityKind::Order, local_id).await?;
            match linked {
                None => match self.api.create(EntityKind::Order, &self.create_payload(&order)).await
                {
                    Ok(record) => {
                        self.metadata.set_remote_id(EntityKind::Order, local_id, &record.id).await?;
                        self.detector.lock_changes(EntityKind::Order, local_id, &fields).await?;
                        self.note(&order, "created").await;
                        return Ok(());
                    }
                    Err(err) if err.names_external_source_conflict() && !recovered => {
                        let criteria = identity_criteria(local_id, &self.integration);
                        let matches = self.api.search(EntityKind::Order, &criteria).await?;
                        match adopt_single_match(matches) {
                            Some(remote_id) => {
                                debug!(order_id = local_id, remote_id, "adopted existing remote order");
                                self.metadata
                                    .set_remote_id(EntityKind::Order, local_id, &remote_id)
                                    .await?;
                                recovered = true;
                            }
                            None => return Err(err.into()),
                        }
                    }
                    Err(err) => return Err(err.into()),
                },
                Some(remote_id) => {
                    if !force && !self.detector.is_changed(EntityKind::Order, local_id, &fields).await? {
                        return Ok(());
                    }
                    match self
                        .api
                        .update(EntityKind::Order, &remote_id, &Self::update_payload(&order))
                        .await
                    {
                        Ok(_) => {
                            self.detector.lock_changes(EntityKind::Order, local_id, &fields).await?;
                            self.note(&order, "updated").await;
                            return Ok(());
                        }
                        Err(ApiError::NotFound { .. }) if !recovered => {
                            debug!(order_id = local_id, remote_id, "linked remote order is gone, recreating");
                            self.metadata.clear_remote_id(EntityKind::Order, local_id).await?;
                            recovered = true;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, local_id: i64) -> SyncResult<()> {
        let Some(remote_id) = self.metadata.get_remote_id(EntityKind::Order, local_id).await? else {
            return Ok(());
        };
        let remote_result = self.api.delete(EntityKind::Order, &remote_id).await;
        // Local metadata is cleared no matter how the remote call went, so
        // a deleted local order never keeps a dangling link.
        self.metadata.clear_remote_id(EntityKind::Order, local_id).await?;
        self.metadata.clear_fingerprint(EntityKind::Order, local_id).await?;
        remote_result.map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn unlink(&self, local_id: i64) -> SyncResult<()> {
        self.metadata.clear_remote_id(EntityKind::Order, local_id).await?;
        self.metadata.clear_fingerprint(EntityKind::Order, local_id).await?;
        Ok(())
    }
}
