//! Example: wiring the sync engine end to end
//!
//! Builds the full stack (SQLite metadata store, workspace client,
//! per-entity sync services, orchestrator, task driver) against a demo
//! in-memory commerce store and pushes one order.
//!
//! # Setup
//!
//! 1. Export the required configuration: ```bash export
//!    STORELINK_DB_PATH=/tmp/storelink-demo.db export
//!    STORELINK_API_BASE_URL=https://api.example.com/v1 export
//!    STORELINK_API_KEY=... export STORELINK_INTEGRATION_ID=... export
//!    STORELINK_WEBHOOK_ID=... ```
//!
//! 2. Run this example: ```bash cargo run --example engine_wiring ```

use std::sync::Arc;

use async_trait::async_trait;
use storelink_core::sync::ports::{SyncMetadataRepository, TaskQueue, WorkspaceApi};
use storelink_core::{
    BulkTaskHandler, CommerceStore, OrderItemSync, OrderSync, ProductSync, Synchronizer,
};
use storelink_domain::{Order, OrderItem, Product, Result, TaskKind};
use storelink_infra::config;
use storelink_infra::{
    DbManager, SqliteSyncMetadataRepository, SqliteTaskRepository, TaskDriver, WorkspaceClient,
};

/// Minimal commerce store standing in for the host platform.
struct DemoStore {
    order: Order,
    items: Vec<OrderItem>,
    product: Product,
}

#[async_trait]
impl CommerceStore for DemoStore {
    async fn order(&self, order_id: i64) -> Result<Option<Order>> {
        Ok((self.order.id == order_id).then(|| self.order.clone()))
    }

    async fn order_item(&self, item_id: i64) -> Result<Option<OrderItem>> {
        Ok(self.items.iter().find(|item| item.id == item_id).cloned())
    }

    async fn order_items(&self, order_id: i64) -> Result<Vec<OrderItem>> {
        Ok(self.items.iter().filter(|item| item.order_id == order_id).cloned().collect())
    }

    async fn product(&self, product_id: i64) -> Result<Option<Product>> {
        Ok((self.product.id == product_id).then(|| self.product.clone()))
    }

    async fn order_items_referencing_product(&self, product_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .items
            .iter()
            .filter(|item| item.product_id == Some(product_id))
            .map(|item| item.id)
            .collect())
    }

    async fn add_order_note(&self, order_id: i64, note: &str) -> Result<()> {
        println!("note on order {order_id}: {note}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("StoreLink Engine Wiring Example");
    println!("===============================\n");

    let config = config::load()?;
    let integration = config.workspace.integration();
    println!("✓ Configuration loaded (integration: {integration})");

    let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
    db.run_migrations()?;
    println!("✓ Metadata database ready at {}", db.path().display());

    let metadata: Arc<dyn SyncMetadataRepository> =
        Arc::new(SqliteSyncMetadataRepository::new(Arc::clone(&db)));
    let tasks: Arc<dyn TaskQueue> = Arc::new(SqliteTaskRepository::new(Arc::clone(&db)));
    let api: Arc<dyn WorkspaceApi> = Arc::new(WorkspaceClient::new(&config.workspace)?);

    let store: Arc<dyn CommerceStore> = Arc::new(DemoStore {
        order: Order {
            id: 1,
            number: "1001".to_string(),
            status: "paid".to_string(),
            email: "buyer@example.com".to_string(),
            total: 49.98,
        },
        items: vec![OrderItem {
            id: 1,
            order_id: 1,
            name: "Demo widget".to_string(),
            quantity: 2,
            price: 24.99,
            total: 49.98,
            product_id: Some(1),
        }],
        product: Product {
            id: 1,
            name: "Demo widget".to_string(),
            sku: "DEMO-1".to_string(),
            price: 24.99,
            image_url: None,
            options: vec![],
        },
    });

    let synchronizer = Arc::new(Synchronizer::new(
        Arc::new(OrderSync::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&metadata),
            integration.clone(),
        )),
        Arc::new(OrderItemSync::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&metadata),
            integration.clone(),
        )),
        Arc::new(ProductSync::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&metadata),
            integration,
        )),
        Arc::clone(&store),
        Arc::clone(&metadata),
        Arc::clone(&tasks),
        config.workspace.events_enabled,
    ));

    println!("\n→ Pushing order 1 (cascades to its items and product)");
    synchronizer.sync_order(1, false).await;

    println!("→ Enqueueing a bulk resync and draining it through the driver");
    let task_id = tasks.enqueue(TaskKind::OrdersSync, &[1]).await?;
    let driver = TaskDriver::new(
        Arc::clone(&synchronizer) as Arc<dyn BulkTaskHandler>,
        Arc::clone(&tasks),
        (&config.driver).into(),
    );
    driver.tick().await?;

    match tasks.get(task_id).await? {
        Some(task) => println!("✓ Task {task_id} finished as {} ({} failed)", task.status, task.failed_count),
        None => println!("✗ Task {task_id} disappeared"),
    }

    Ok(())
}
