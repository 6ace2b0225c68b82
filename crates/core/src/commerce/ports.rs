//! Read access to the local commerce records the sync services act on.

use async_trait::async_trait;
use storelink_domain::{Order, OrderItem, Product, Result};

/// Local commerce storage.
///
/// The sync services never mutate commerce records; the only write is the
/// audit note appended to an order after a successful remote exchange.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn order(&self, order_id: i64) -> Result<Option<Order>>;

    async fn order_item(&self, item_id: i64) -> Result<Option<OrderItem>>;

    /// All items belonging to an order, used when cascading an order-level
    /// operation down to its items.
    async fn order_items(&self, order_id: i64) -> Result<Vec<OrderItem>>;

    async fn product(&self, product_id: i64) -> Result<Option<Product>>;

    /// Ids of order items that reference the given product. Drives the
    /// demand check: a product is only pushed remotely once at least one
    /// linked order item needs it.
    async fn order_items_referencing_product(&self, product_id: i64) -> Result<Vec<i64>>;

    /// Append a human-readable audit note to an order. Failures here must
    /// not fail the surrounding sync.
    async fn add_order_note(&self, order_id: i64, note: &str) -> Result<()>;
}
