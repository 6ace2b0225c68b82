//! SQLite-backed storage for sync metadata and background tasks.

pub mod manager;
pub mod sync_metadata_repository;
pub mod task_repository;

pub use manager::DbManager;
pub use sync_metadata_repository::SqliteSyncMetadataRepository;
pub use task_repository::SqliteTaskRepository;
