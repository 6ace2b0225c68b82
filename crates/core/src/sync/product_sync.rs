//! Product synchronization.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use storelink_domain::constants::{
    EXTERNAL_SOURCE_INTEGRATION_FIELD, EXTERNAL_SOURCE_SYNC_ID_FIELD,
};
use storelink_domain::{ApiError, EntityKind, Product};

use crate::commerce::ports::CommerceStore;
use crate::sync::changes::ChangesDetector;
use crate::sync::entity::{adopt_single_match, identity_criteria, EntitySync};
use crate::sync::errors::{SyncError, SyncResult};
use crate::sync::ports::{SyncMetadataRepository, WorkspaceApi};

pub struct ProductSync {
    api: Arc<dyn WorkspaceApi>,
    store: Arc<dyn CommerceStore>,
    metadata: Arc<dyn SyncMetadataRepository>,
    detector: ChangesDetector,
    integration: String,
}

impl ProductSync {
    pub fn new(
        api: Arc<dyn WorkspaceApi>,
        store: Arc<dyn CommerceStore>,
        metadata: Arc<dyn SyncMetadataRepository>,
        integration: String,
    ) -> Self {
        let detector = ChangesDetector::new(Arc::clone(&metadata));
        Self { api, store, metadata, detector, integration }
    }

    fn watched_fields(product: &Product) -> Vec<String> {
        vec![
            product.name.clone(),
            product.sku.clone(),
            product.price.to_string(),
            product.image_url.clone().unwrap_or_default(),
        ]
    }

    fn base_payload(product: &Product) -> Value {
        let mut payload = json!({
            "name": product.name,
            "sku": product.sku,
            "price": product.price,
        });
        if let (Value::Object(map), Some(image_url)) = (&mut payload, &product.image_url) {
            map.insert("imageUrl".to_string(), json!(image_url));
        }
        payload
    }

    fn create_payload(&self, product: &Product) -> Value {
        let mut payload = Self::base_payload(product);
        if let Value::Object(map) = &mut payload {
            map.insert(EXTERNAL_SOURCE_SYNC_ID_FIELD.to_string(), json!(product.id.to_string()));
            map.insert(EXTERNAL_SOURCE_INTEGRATION_FIELD.to_string(), json!(self.integration));
        }
        payload
    }
}

#[async_trait]
impl EntitySync for ProductSync {
    #[instrument(skip(self))]
    async fn sync(&self, local_id: i64, force: bool) -> SyncResult<()> {
        let product = self
            .store
            .product(local_id)
            .await
            .map_err(SyncError::from)?
            .ok_or_else(|| {
                SyncError::InvalidArgument(format!("unable to find product {local_id}"))
            })?;
        let fields = Self::watched_fields(&product);

        let mut recovered = false;
        loop {
            let linked = self.metadata.get_remote_id(EntityKind::Product, local_id).await?;
            match linked {
                None => {
                    match self.api.create(EntityKind::Product, &self.create_payload(&product)).await
                    {
                        Ok(record) => {
                            self.metadata
                                .set_remote_id(EntityKind::Product, local_id, &record.id)
                                .await?;
                            self.detector
                                .lock_changes(EntityKind::Product, local_id, &fields)
                                .await?;
                            return Ok(());
                        }
                        Err(err) if err.names_external_source_conflict() && !recovered => {
                            let criteria = identity_criteria(local_id, &self.integration);
                            let matches = self.api.search(EntityKind::Product, &criteria).await?;
                            match adopt_single_match(matches) {
                                Some(remote_id) => {
                                    debug!(product_id = local_id, remote_id, "adopted existing remote product");
                                    self.metadata
                                        .set_remote_id(EntityKind::Product, local_id, &remote_id)
                                        .await?;
                                    recovered = true;
                                }
                                None => return Err(err.into()),
                            }
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                Some(remote_id) => {
                    if !force
                        && !self.detector.is_changed(EntityKind::Product, local_id, &fields).await?
                    {
                        return Ok(());
                    }
                    match self
                        .api
                        .update(EntityKind::Product, &remote_id, &Self::base_payload(&product))
                        .await
                    {
                        Ok(_) => {
                            self.detector
                                .lock_changes(EntityKind::Product, local_id, &fields)
                                .await?;
                            return Ok(());
                        }
                        Err(ApiError::NotFound { .. }) if !recovered => {
                            debug!(product_id = local_id, remote_id, "linked remote product is gone, recreating");
                            self.metadata.clear_remote_id(EntityKind::Product, local_id).await?;
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
        let Some(remote_id) = self.metadata.get_remote_id(EntityKind::Product, local_id).await?
        else {
            return Ok(());
        };
        let remote_result = self.api.delete(EntityKind::Product, &remote_id).await;
        self.metadata.clear_remote_id(EntityKind::Product, local_id).await?;
        self.metadata.clear_fingerprint(EntityKind::Product, local_id).await?;
        remote_result.map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn unlink(&self, local_id: i64) -> SyncResult<()> {
        self.metadata.clear_remote_id(EntityKind::Product, local_id).await?;
        self.metadata.clear_fingerprint(EntityKind::Product, local_id).await?;
        Ok(())
    }
}
