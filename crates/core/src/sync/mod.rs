//! Synchronization services.
//!
//! The services in this module keep local commerce records and their remote
//! workspace counterparts converged. [`entity::EntitySync`] is implemented
//! once per entity kind; [`synchronizer::Synchronizer`] orchestrates the
//! per-entity services into event handlers, cascades and bulk tasks.

pub mod changes;
pub mod entity;
pub mod errors;
pub mod order_item_sync;
pub mod order_sync;
pub mod ports;
pub mod product_sync;
pub mod synchronizer;
