//! Core business logic for StoreLink.
//!
//! This crate holds the synchronization services and the ports they depend
//! on. Everything here is storage- and transport-agnostic: persistence and
//! HTTP live behind the traits in [`sync::ports`] and [`commerce::ports`],
//! with concrete implementations provided by `storelink-infra`.

pub mod commerce;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use commerce::CommerceStore;
pub use sync::changes::ChangesDetector;
pub use sync::entity::EntitySync;
pub use sync::errors::{SyncError, SyncResult};
pub use sync::order_item_sync::OrderItemSync;
pub use sync::order_sync::OrderSync;
pub use sync::product_sync::ProductSync;
pub use sync::synchronizer::{BulkTaskHandler, SyncEventHandler, Synchronizer};
