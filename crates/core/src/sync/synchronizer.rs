//! Orchestration of the per-entity sync services.
//!
//! The [`Synchronizer`] is the single entry point the rest of the system
//! talks to: platform events arrive through [`SyncEventHandler`], queued
//! bulk jobs through [`BulkTaskHandler`]. Entry points never propagate
//! errors to the caller; failures are logged (with the captured HTTP
//! exchange when one exists) so that a failing remote never breaks local
//! commerce flows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use storelink_domain::{EntityKind, TaskKind, TaskStatus};

use crate::commerce::ports::CommerceStore;
use crate::sync::entity::EntitySync;
use crate::sync::errors::{SyncError, SyncResult};
use crate::sync::ports::{SyncMetadataRepository, TaskQueue};

pub struct Synchronizer {
    order_sync: Arc<dyn EntitySync>,
    order_item_sync: Arc<dyn EntitySync>,
    product_sync: Arc<dyn EntitySync>,
    store: Arc<dyn CommerceStore>,
    metadata: Arc<dyn SyncMetadataRepository>,
    tasks: Arc<dyn TaskQueue>,
    events_enabled: AtomicBool,
}

impl Synchronizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_sync: Arc<dyn EntitySync>,
        order_item_sync: Arc<dyn EntitySync>,
        product_sync: Arc<dyn EntitySync>,
        store: Arc<dyn CommerceStore>,
        metadata: Arc<dyn SyncMetadataRepository>,
        tasks: Arc<dyn TaskQueue>,
        events_enabled: bool,
    ) -> Self {
        Self {
            order_sync,
            order_item_sync,
            product_sync,
            store,
            metadata,
            tasks,
            events_enabled: AtomicBool::new(events_enabled),
        }
    }

    pub fn events_enabled(&self) -> bool {
        self.events_enabled.load(Ordering::Relaxed)
    }

    /// Toggle event processing at runtime. While disabled every entry
    /// point returns immediately without touching local or remote state.
    pub fn set_events_enabled(&self, enabled: bool) {
        self.events_enabled.store(enabled, Ordering::Relaxed);
    }

    fn gate(&self) -> bool {
        let enabled = self.events_enabled();
        if !enabled {
            debug!("event processing is disabled, ignoring");
        }
        enabled
    }

    fn log_failure(operation: &str, entity: &str, local_id: i64, err: &SyncError) {
        match err {
            SyncError::PreconditionNotMet(_) => {
                debug!(operation, entity, local_id, %err, "sync deferred");
            }
            other => match other.exchange() {
                Some(exchange) => warn!(
                    operation,
                    entity,
                    local_id,
                    %err,
                    method = %exchange.method,
                    url = %exchange.url,
                    status = ?exchange.status,
                    response = ?exchange.response_body,
                    "sync operation failed"
                ),
                None => warn!(operation, entity, local_id, %err, "sync operation failed"),
            },
        }
    }

    // --- orders ---

    #[instrument(skip(self))]
    pub async fn sync_order(&self, order_id: i64, force: bool) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.sync_order_inner(order_id, force).await {
            Self::log_failure("sync", "order", order_id, &err);
        }
    }

    /// Order first, then each of its items. Item failures are isolated
    /// from one another; an order failure aborts the cascade since no item
    /// can be pushed without the order link.
    async fn sync_order_inner(&self, order_id: i64, force: bool) -> SyncResult<()> {
        self.order_sync.sync(order_id, force).await?;
        let items = self.store.order_items(order_id).await.map_err(SyncError::from)?;
        for item in items {
            if let Err(err) = self.sync_order_item_inner(item.id, force).await {
                Self::log_failure("sync", "order_item", item.id, &err);
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: i64) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.delete_order_inner(order_id).await {
            Self::log_failure("delete", "order", order_id, &err);
        }
    }

    /// Items are removed before the order so that no remote item is ever
    /// left pointing at a deleted order.
    async fn delete_order_inner(&self, order_id: i64) -> SyncResult<()> {
        let items = self.store.order_items(order_id).await.map_err(SyncError::from)?;
        for item in items {
            if let Err(err) = self.order_item_sync.delete(item.id).await {
                Self::log_failure("delete", "order_item", item.id, &err);
            }
        }
        self.order_sync.delete(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn unlink_order(&self, order_id: i64) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.unlink_order_inner(order_id).await {
            Self::log_failure("unlink", "order", order_id, &err);
        }
    }

    async fn unlink_order_inner(&self, order_id: i64) -> SyncResult<()> {
        let items = self.store.order_items(order_id).await.map_err(SyncError::from)?;
        for item in items {
            if let Err(err) = self.order_item_sync.unlink(item.id).await {
                Self::log_failure("unlink", "order_item", item.id, &err);
            }
        }
        self.order_sync.unlink(order_id).await
    }

    // --- order items ---

    #[instrument(skip(self))]
    pub async fn sync_order_item(&self, item_id: i64, force: bool) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.sync_order_item_inner(item_id, force).await {
            Self::log_failure("sync", "order_item", item_id, &err);
        }
    }

    /// The referenced product is pushed before the item so the item payload
    /// can carry the product link.
    async fn sync_order_item_inner(&self, item_id: i64, force: bool) -> SyncResult<()> {
        let Some(item) = self.store.order_item(item_id).await.map_err(SyncError::from)? else {
            debug!(item_id, "order item is gone locally, nothing to sync");
            return Ok(());
        };
        if let Some(product_id) = item.product_id {
            self.product_sync.sync(product_id, force).await?;
        }
        self.order_item_sync.sync(item_id, force).await
    }

    #[instrument(skip(self))]
    pub async fn delete_order_item(&self, item_id: i64) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.order_item_sync.delete(item_id).await {
            Self::log_failure("delete", "order_item", item_id, &err);
        }
    }

    #[instrument(skip(self))]
    pub async fn unlink_order_item(&self, item_id: i64) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.order_item_sync.unlink(item_id).await {
            Self::log_failure("unlink", "order_item", item_id, &err);
        }
    }

    // --- products ---

    #[instrument(skip(self))]
    pub async fn sync_product(&self, product_id: i64, force: bool) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.sync_product_inner(product_id, force).await {
            Self::log_failure("sync", "product", product_id, &err);
        }
    }

    /// Products are demand-driven: one is only pushed on its own account
    /// when some already-synced order item references it. Item cascades
    /// bypass this check by calling the product sync directly.
    async fn sync_product_inner(&self, product_id: i64, force: bool) -> SyncResult<()> {
        if !self.product_in_demand(product_id).await? {
            debug!(product_id, "no synced order item references this product, skipping");
            return Ok(());
        }
        self.product_sync.sync(product_id, force).await
    }

    async fn product_in_demand(&self, product_id: i64) -> SyncResult<bool> {
        let item_ids =
            self.store.order_items_referencing_product(product_id).await.map_err(SyncError::from)?;
        for item_id in item_ids {
            if self.metadata.get_remote_id(EntityKind::OrderItem, item_id).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: i64) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.product_sync.delete(product_id).await {
            Self::log_failure("delete", "product", product_id, &err);
        }
    }

    #[instrument(skip(self))]
    pub async fn unlink_product(&self, product_id: i64) {
        if !self.gate() {
            return;
        }
        if let Err(err) = self.product_sync.unlink(product_id).await {
            Self::log_failure("unlink", "product", product_id, &err);
        }
    }

    // --- bulk tasks ---

    pub async fn enqueue_bulk_orders_sync(&self, order_ids: &[i64]) -> SyncResult<i64> {
        self.tasks.enqueue(TaskKind::OrdersSync, order_ids).await.map_err(Into::into)
    }

    pub async fn enqueue_delete_data(&self, order_ids: &[i64]) -> SyncResult<i64> {
        self.tasks.enqueue(TaskKind::OrdersDelete, order_ids).await.map_err(Into::into)
    }

    /// Resync a batch of orders from scratch. Each order's fingerprint is
    /// cleared first so its remote record is rewritten even when the
    /// watched fields look clean. Per-order failures are counted against
    /// the task but never stop the batch.
    #[instrument(skip(self, order_ids), fields(orders = order_ids.len()))]
    pub async fn run_bulk_orders_sync(&self, order_ids: &[i64], task_id: Option<i64>) {
        if !self.gate() {
            self.drain_task(task_id).await;
            return;
        }
        info!("bulk orders sync started");
        if let Some(task_id) = task_id {
            self.mark(task_id, TaskStatus::Processing).await;
        }
        let mut failed_count = 0u32;
        let mut last_error: Option<String> = None;
        for &order_id in order_ids {
            if let Err(err) = self.metadata.clear_fingerprint(EntityKind::Order, order_id).await {
                warn!(order_id, %err, "unable to clear order fingerprint before resync");
            }
            if let Err(err) = self.sync_order_inner(order_id, false).await {
                failed_count += 1;
                last_error = Some(err.to_string());
                Self::log_failure("bulk_sync", "order", order_id, &err);
            }
        }
        self.finish_task(task_id, failed_count, last_error).await;
        info!(failed_count, "bulk orders sync finished");
    }

    /// Delete a batch of orders (items first) from the remote workspace.
    #[instrument(skip(self, order_ids), fields(orders = order_ids.len()))]
    pub async fn run_delete_data(&self, order_ids: &[i64], task_id: Option<i64>) {
        if !self.gate() {
            self.drain_task(task_id).await;
            return;
        }
        info!("bulk data deletion started");
        if let Some(task_id) = task_id {
            self.mark(task_id, TaskStatus::Processing).await;
        }
        let mut failed_count = 0u32;
        let mut last_error: Option<String> = None;
        for &order_id in order_ids {
            if let Err(err) = self.delete_order_inner(order_id).await {
                failed_count += 1;
                last_error = Some(err.to_string());
                Self::log_failure("bulk_delete", "order", order_id, &err);
            }
        }
        self.finish_task(task_id, failed_count, last_error).await;
        info!(failed_count, "bulk data deletion finished");
    }

    /// A claimed task still terminates while the gate is closed; leaving it
    /// queued would make the driver re-dispatch the same task on every
    /// poll. Its order ids are skipped, not failed.
    async fn drain_task(&self, task_id: Option<i64>) {
        let Some(task_id) = task_id else { return };
        self.mark(task_id, TaskStatus::Processing).await;
        self.mark(task_id, TaskStatus::Processed).await;
    }

    async fn mark(&self, task_id: i64, status: TaskStatus) {
        if let Err(err) = self.tasks.set_status(task_id, status).await {
            warn!(task_id, %status, %err, "unable to update task status");
        }
    }

    async fn finish_task(&self, task_id: Option<i64>, failed_count: u32, last_error: Option<String>) {
        let Some(task_id) = task_id else { return };
        if failed_count > 0 {
            if let Err(err) =
                self.tasks.record_failures(task_id, failed_count, last_error.as_deref()).await
            {
                warn!(task_id, %err, "unable to record task failures");
            }
        }
        self.mark(task_id, TaskStatus::Processed).await;
    }
}

/// Platform event surface. Each hook maps a local commerce event onto the
/// matching sync operation.
#[async_trait]
pub trait SyncEventHandler: Send + Sync {
    async fn order_saved(&self, order_id: i64);
    /// A trashed order is force-pushed so its terminal status reaches the
    /// workspace even when the watched fields happen to match.
    async fn order_trashed(&self, order_id: i64);
    async fn order_deleted(&self, order_id: i64);
    async fn order_item_saved(&self, item_id: i64);
    async fn order_item_deleted(&self, item_id: i64);
    async fn product_saved(&self, product_id: i64);
    async fn product_deleted(&self, product_id: i64);
}

#[async_trait]
impl SyncEventHandler for Synchronizer {
    async fn order_saved(&self, order_id: i64) {
        self.sync_order(order_id, false).await;
    }

    async fn order_trashed(&self, order_id: i64) {
        self.sync_order(order_id, true).await;
    }

    async fn order_deleted(&self, order_id: i64) {
        self.delete_order(order_id).await;
    }

    async fn order_item_saved(&self, item_id: i64) {
        self.sync_order_item(item_id, false).await;
    }

    async fn order_item_deleted(&self, item_id: i64) {
        self.delete_order_item(item_id).await;
    }

    async fn product_saved(&self, product_id: i64) {
        self.sync_product(product_id, false).await;
    }

    async fn product_deleted(&self, product_id: i64) {
        self.delete_product(product_id).await;
    }
}

/// Dispatch surface the queue driver uses to run a claimed task.
#[async_trait]
pub trait BulkTaskHandler: Send + Sync {
    async fn bulk_orders_sync(&self, order_ids: &[i64], task_id: Option<i64>);
    async fn delete_data(&self, order_ids: &[i64], task_id: Option<i64>);
}

#[async_trait]
impl BulkTaskHandler for Synchronizer {
    async fn bulk_orders_sync(&self, order_ids: &[i64], task_id: Option<i64>) {
        self.run_bulk_orders_sync(order_ids, task_id).await;
    }

    async fn delete_data(&self, order_ids: &[i64], task_id: Option<i64>) {
        self.run_delete_data(order_ids, task_id).await;
    }
}
