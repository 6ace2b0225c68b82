//! Order item synchronization.
//!
//! Items live under their parent order remotely, so an item can only be
//! pushed once the order carries a remote link. Product details are folded
//! into the item payload when they are available locally; a missing or
//! unreadable product degrades the payload instead of failing the item.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use storelink_domain::constants::{
    EXTERNAL_SOURCE_INTEGRATION_FIELD, EXTERNAL_SOURCE_SYNC_ID_FIELD,
};
use storelink_domain::{ApiError, EntityKind, OrderItem};

use crate::commerce::ports::CommerceStore;
use crate::sync::changes::ChangesDetector;
use crate::sync::entity::{adopt_single_match, identity_criteria, EntitySync};
use crate::sync::errors::{SyncError, SyncResult};
use crate::sync::ports::{SyncMetadataRepository, WorkspaceApi};

pub struct OrderItemSync {
    api: Arc<dyn WorkspaceApi>,
    store: Arc<dyn CommerceStore>,
    metadata: Arc<dyn SyncMetadataRepository>,
    detector: ChangesDetector,
    integration: String,
}

impl OrderItemSync {
    pub fn new(
        api: Arc<dyn WorkspaceApi>,
        store: Arc<dyn CommerceStore>,
        metadata: Arc<dyn SyncMetadataRepository>,
        integration: String,
    ) -> Self {
        let detector = ChangesDetector::new(Arc::clone(&metadata));
        Self { api, store, metadata, detector, integration }
    }

    fn watched_fields(item: &OrderItem) -> Vec<String> {
        vec![
            item.name.clone(),
            item.quantity.to_string(),
            item.price.to_string(),
            item.total.to_string(),
        ]
    }

    /// Product details embedded in the item payload. Any failure to read
    /// the product or its remote link degrades to an empty context.
    async fn product_context(&self, item: &OrderItem) -> Map<String, Value> {
        let mut context = Map::new();
        let Some(product_id) = item.product_id else {
            return context;
        };
        match self.store.product(product_id).await {
            Ok(Some(product)) => {
                context.insert("productSku".to_string(), json!(product.sku));
                context.insert("productOptions".to_string(), json!(product.options));
                if let Some(image_url) = &product.image_url {
                    context.insert("imageUrl".to_string(), json!(image_url));
                }
                context.insert("externalProductId".to_string(), json!(product_id.to_string()));
            }
            Ok(None) => {
                debug!(item_id = item.id, product_id, "product is gone locally, syncing item without it");
            }
            Err(err) => {
                debug!(item_id = item.id, product_id, %err, "product unreadable, syncing item without it");
            }
        }
        match self.metadata.get_remote_id(EntityKind::Product, product_id).await {
            Ok(Some(remote_id)) => {
                context.insert("product".to_string(), json!(format!("/products/{remote_id}")));
            }
            Ok(None) => {}
            Err(err) => {
                debug!(item_id = item.id, product_id, %err, "product link unreadable, omitting reference");
            }
        }
        context
    }

    fn create_payload(
        &self,
        item: &OrderItem,
        order_remote_id: &str,
        context: Map<String, Value>,
    ) -> Value {
        let mut payload = json!({
            "order": format!("/orders/{order_remote_id}"),
            "productName": item.name,
            "qty": item.quantity,
            "price": item.price,
            "rowTotal": item.total,
            EXTERNAL_SOURCE_SYNC_ID_FIELD: item.id.to_string(),
            EXTERNAL_SOURCE_INTEGRATION_FIELD: self.integration,
        });
        if let Value::Object(map) = &mut payload {
            map.extend(context);
        }
        payload
    }

    fn update_payload(item: &OrderItem, context: Map<String, Value>) -> Value {
        let mut payload = json!({
            "productName": item.name,
            "qty": item.quantity,
            "price": item.price,
            "rowTotal": item.total,
        });
        if let Value::Object(map) = &mut payload {
            map.extend(context);
        }
        payload
    }

    async fn note(&self, item: &OrderItem, action: &str) {
        let note = format!("Order item {} was {} in the remote workspace", item.name, action);
        if let Err(err) = self.store.add_order_note(item.order_id, &note).await {
            debug!(item_id = item.id, %err, "unable to record order audit note");
        }
    }
}

#[async_trait]
impl EntitySync for OrderItemSync {
    #[instrument(skip(self))]
    async fn sync(&self, local_id: i64, force: bool) -> SyncResult<()> {
        let item = self
            .store
            .order_item(local_id)
            .await
            .map_err(SyncError::from)?
            .ok_or_else(|| {
                SyncError::InvalidArgument(format!("unable to find order item {local_id}"))
            })?;
        let order_remote_id = self
            .metadata
            .get_remote_id(EntityKind::Order, item.order_id)
            .await?
            .ok_or_else(|| {
                SyncError::PreconditionNotMet(format!(
                    "order {} of item {local_id} has no remote link yet",
                    item.order_id
                ))
            })?;
        let fields = Self::watched_fields(&item);

        let mut recovered = false;
        loop {
            let linked = self.metadata.get_remote_id(EntityKind::OrderItem, local_id).await?;
            match linked {
                None => {
                    let context = self.product_context(&item).await;
                    let payload = self.create_payload(&item, &order_remote_id, context);
                    match self.api.create(EntityKind::OrderItem, &payload).await {
                        Ok(record) => {
                            self.metadata
                                .set_remote_id(EntityKind::OrderItem, local_id, &record.id)
                                .await?;
                            self.detector
                                .lock_changes(EntityKind::OrderItem, local_id, &fields)
                                .await?;
                            self.note(&item, "created").await;
                            return Ok(());
                        }
                        Err(err) if err.names_external_source_conflict() && !recovered => {
                            let criteria = identity_criteria(local_id, &self.integration);
                            let matches =
                                self.api.search_order_items(&order_remote_id, &criteria).await?;
                            match adopt_single_match(matches) {
                                Some(remote_id) => {
                                    debug!(item_id = local_id, remote_id, "adopted existing remote order item");
                                    self.metadata
                                        .set_remote_id(EntityKind::OrderItem, local_id, &remote_id)
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
                        && !self.detector.is_changed(EntityKind::OrderItem, local_id, &fields).await?
                    {
                        return Ok(());
                    }
                    let context = self.product_context(&item).await;
                    let payload = Self::update_payload(&item, context);
                    match self.api.update(EntityKind::OrderItem, &remote_id, &payload).await {
                        Ok(_) => {
                            self.detector
                                .lock_changes(EntityKind::OrderItem, local_id, &fields)
                                .await?;
                            self.note(&item, "updated").await;
                            return Ok(());
                        }
                        Err(ApiError::NotFound { .. }) if !recovered => {
                            debug!(item_id = local_id, remote_id, "linked remote order item is gone, recreating");
                            self.metadata.clear_remote_id(EntityKind::OrderItem, local_id).await?;
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
        let Some(remote_id) =
            self.metadata.get_remote_id(EntityKind::OrderItem, local_id).await?
        else {
            return Ok(());
        };
        let remote_result = self.api.delete(EntityKind::OrderItem, &remote_id).await;
        self.metadata.clear_remote_id(EntityKind::OrderItem, local_id).await?;
        self.metadata.clear_fingerprint(EntityKind::OrderItem, local_id).await?;
        remote_result.map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn unlink(&self, local_id: i64) -> SyncResult<()> {
        self.metadata.clear_remote_id(EntityKind::OrderItem, local_id).await?;
        self.metadata.clear_fingerprint(EntityKind::OrderItem, local_id).await?;
        Ok(())
    }
}
