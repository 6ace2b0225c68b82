//! Local commerce entity views
//!
//! The hosting e-commerce platform owns these records; StoreLink only reads
//! them through the `CommerceStore` port and attaches sync metadata keyed by
//! their local ids.

use serde::{Deserialize, Serialize};

/// Kind of local entity the engine synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Order,
    OrderItem,
    Product,
}

crate::impl_domain_status_conversions!(EntityKind {
    Order => "order",
    OrderItem => "order_item",
    Product => "product"
});

impl EntityKind {
    /// Remote collection path for this entity kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Order => "/orders",
            Self::OrderItem => "/order_items",
            Self::Product => "/products",
        }
    }
}

/// Order view handed over by the hosting platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub number: String,
    pub status: String,
    pub email: String,
    pub total: f64,
}

/// Order line item view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
    pub total: f64,
    /// Underlying product, when the item still resolves to one
    pub product_id: Option<i64>,
}

/// Product view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub image_url: Option<String>,
    /// Visible attribute values (e.g. colour, size) carried into order-item
    /// payloads as product options
    pub options: Vec<String>,
}
