//! # StoreLink Domain
//!
//! Business domain types and models for StoreLink.
//!
//! This crate contains:
//! - Local commerce entity views (Order, OrderItem, Product)
//! - Synchronization records (RemoteLink, BackgroundTask)
//! - Remote API types (RemoteRecord, ApiExchange, ApiError)
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other StoreLink crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
