//! # StoreLink Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - SQLite storage for sync metadata and the background task queue
//! - The HTTP client and the workspace API client built on it
//! - The background task driver
//! - Configuration loading (environment variables and TOML files)
//!
//! ## Architecture
//! - Implements traits defined in `storelink-core`
//! - Contains all "impure" code (I/O, HTTP, clocks)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod scheduling;
pub mod workspace;

pub use database::manager::DbManager;
pub use database::sync_metadata_repository::SqliteSyncMetadataRepository;
pub use database::task_repository::SqliteTaskRepository;
pub use http::HttpClient;
pub use scheduling::task_driver::{TaskDriver, TaskDriverConfig};
pub use workspace::WorkspaceClient;
