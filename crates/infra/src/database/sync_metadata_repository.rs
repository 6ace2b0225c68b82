//! Sync metadata repository implementation.
//!
//! Stores the remote link and change fingerprint for each local entity in
//! the `entity_meta` table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use storelink_core::sync::ports::SyncMetadataRepository;
use storelink_domain::{EntityKind, Result as DomainResult, StoreLinkError};
use tokio::task;

use super::manager::{DbConnection, DbManager};
use crate::errors::InfraError;

/// SQLite-based sync metadata repository.
pub struct SqliteSyncMetadataRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncMetadataRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncMetadataRepository for SqliteSyncMetadataRepository {
    async fn get_remote_id(&self, kind: EntityKind, local_id: i64) -> DomainResult<Option<String>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<String>> {
            let conn = db.get_connection()?;
            query_column(&conn, "remote_id", kind, local_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_remote_id(
        &self,
        kind: EntityKind,
        local_id: i64,
        remote_id: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let remote_id = remote_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_column(&conn, "remote_id", kind, local_id, &remote_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn clear_remote_id(&self, kind: EntityKind, local_id: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            clear_column(&conn, "remote_id", kind, local_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_fingerprint(
        &self,
        kind: EntityKind,
        local_id: i64,
    ) -> DomainResult<Option<String>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<String>> {
            let conn = db.get_connection()?;
            query_column(&conn, "fingerprint", kind, local_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_fingerprint(
        &self,
        kind: EntityKind,
        local_id: i64,
        fingerprint: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let fingerprint = fingerprint.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_column(&conn, "fingerprint", kind, local_id, &fingerprint)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn clear_fingerprint(&self, kind: EntityKind, local_id: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            clear_column(&conn, "fingerprint", kind, local_id)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

// `column` is always one of the two literals above, never user input.

fn query_column(
    conn: &DbConnection,
    column: &str,
    kind: EntityKind,
    local_id: i64,
) -> DomainResult<Option<String>> {
    let sql =
        format!("SELECT {column} FROM entity_meta WHERE entity_type = ?1 AND local_id = ?2");

    match conn.query_row(&sql, params![kind.to_string(), local_id], |row| {
        row.get::<_, Option<String>>(0)
    }) {
        Ok(value) => Ok(value),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(map_sql_error(err)),
    }
}

fn upsert_column(
    conn: &DbConnection,
    column: &str,
    kind: EntityKind,
    local_id: i64,
    value: &str,
) -> DomainResult<()> {
    let now = Utc::now().timestamp();
    let sql = format!(
        "INSERT INTO entity_meta (entity_type, local_id, {column}, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT (entity_type, local_id)
         DO UPDATE SET {column} = excluded.{column}, updated_at = excluded.updated_at"
    );

    conn.execute(&sql, params![kind.to_string(), local_id, value, now])
        .map_err(map_sql_error)?;
    Ok(())
}

fn clear_column(
    conn: &DbConnection,
    column: &str,
    kind: EntityKind,
    local_id: i64,
) -> DomainResult<()> {
    let now = Utc::now().timestamp();
    let sql = format!(
        "UPDATE entity_meta SET {column} = NULL, updated_at = ?3
         WHERE entity_type = ?1 AND local_id = ?2"
    );
    conn.execute(&sql, params![kind.to_string(), local_id, now]).map_err(map_sql_error)?;

    // Rows with neither value left carry no information.
    conn.execute(
        "DELETE FROM entity_meta
         WHERE entity_type = ?1 AND local_id = ?2
           AND remote_id IS NULL AND fingerprint IS NULL",
        params![kind.to_string(), local_id],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

// ============================================================================
// Error Mapping
// ============================================================================

fn map_sql_error(err: rusqlite::Error) -> StoreLinkError {
    StoreLinkError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> StoreLinkError {
    if err.is_cancelled() {
        StoreLinkError::Internal("blocking task cancelled".into())
    } else {
        StoreLinkError::Internal(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
