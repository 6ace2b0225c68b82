//! Background task queue implementation.
//!
//! Tasks are stored in the `background_tasks` table; the entity id payload
//! is serialized as a JSON array. Status transitions are validated inside a
//! transaction so a task can never regress.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Row};
use storelink_core::sync::ports::TaskQueue;
use storelink_domain::{
    BackgroundTask, Result as DomainResult, StoreLinkError, TaskKind, TaskStatus,
};
use tokio::task;

use super::manager::{DbConnection, DbManager};
use crate::errors::InfraError;

const TASK_COLUMNS: &str =
    "id, kind, entity_ids, status, failed_count, last_error, created_at, updated_at";

/// SQLite-based background task queue.
pub struct SqliteTaskRepository {
    db: Arc<DbManager>,
}

impl SqliteTaskRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskRepository {
    async fn enqueue(&self, kind: TaskKind, entity_ids: &[i64]) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        let entity_ids = entity_ids.to_vec();

        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            insert_task(&conn, kind, &entity_ids)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(&self, task_id: i64) -> DomainResult<Option<BackgroundTask>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<BackgroundTask>> {
            let conn = db.get_connection()?;
            query_task(&conn, task_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_status(&self, task_id: i64, status: TaskStatus) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            transition_task(&mut conn, task_id, status)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn record_failures(
        &self,
        task_id: i64,
        failed_count: u32,
        last_error: Option<&str>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let last_error = last_error.map(ToString::to_string);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            update_failures(&conn, task_id, failed_count, last_error.as_deref())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn next_queued(&self) -> DomainResult<Option<BackgroundTask>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<BackgroundTask>> {
            let conn = db.get_connection()?;
            query_next_queued(&conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_task(conn: &DbConnection, kind: TaskKind, entity_ids: &[i64]) -> DomainResult<i64> {
    let now = Utc::now().timestamp();
    let payload = serde_json::to_string(entity_ids)
        .map_err(|err| StoreLinkError::Internal(format!("task payload serialization: {err}")))?;

    conn.execute(
        "INSERT INTO background_tasks (kind, entity_ids, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![kind.to_string(), payload, TaskStatus::Queued.to_string(), now],
    )
    .map_err(map_sql_error)?;

    Ok(conn.last_insert_rowid())
}

fn query_task(conn: &DbConnection, task_id: i64) -> DomainResult<Option<BackgroundTask>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM background_tasks WHERE id = ?1");

    match conn.query_row(&sql, params![task_id], map_task_row) {
        Ok(task) => Ok(Some(task?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(map_sql_error(err)),
    }
}

fn query_next_queued(conn: &DbConnection) -> DomainResult<Option<BackgroundTask>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM background_tasks
         WHERE status = ?1 ORDER BY id ASC LIMIT 1"
    );

    match conn.query_row(&sql, params![TaskStatus::Queued.to_string()], map_task_row) {
        Ok(task) => Ok(Some(task?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(map_sql_error(err)),
    }
}

fn transition_task(conn: &mut DbConnection, task_id: i64, status: TaskStatus) -> DomainResult<()> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    let current: String = tx
        .query_row("SELECT status FROM background_tasks WHERE id = ?1", params![task_id], |row| {
            row.get(0)
        })
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreLinkError::NotFound(format!("task {task_id}"))
            }
            other => map_sql_error(other),
        })?;
    let current = TaskStatus::from_str(&current).map_err(StoreLinkError::Database)?;

    if !current.can_transition_to(status) {
        return Err(StoreLinkError::InvalidInput(format!(
            "task {task_id} cannot move from {current} to {status}"
        )));
    }

    tx.execute(
        "UPDATE background_tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![task_id, status.to_string(), Utc::now().timestamp()],
    )
    .map_err(map_sql_error)?;

    tx.commit().map_err(map_sql_error)
}

fn update_failures(
    conn: &DbConnection,
    task_id: i64,
    failed_count: u32,
    last_error: Option<&str>,
) -> DomainResult<()> {
    let updated = conn
        .execute(
            "UPDATE background_tasks SET failed_count = ?2, last_error = ?3, updated_at = ?4
             WHERE id = ?1",
            params![task_id, failed_count, last_error, Utc::now().timestamp()],
        )
        .map_err(map_sql_error)?;

    if updated == 0 {
        return Err(StoreLinkError::NotFound(format!("task {task_id}")));
    }
    Ok(())
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<DomainResult<BackgroundTask>> {
    let kind: String = row.get(1)?;
    let entity_ids: String = row.get(2)?;
    let status: String = row.get(3)?;

    let task = (|| -> DomainResult<BackgroundTask> {
        Ok(BackgroundTask {
            id: row.get(0).map_err(map_sql_error)?,
            kind: TaskKind::from_str(&kind).map_err(StoreLinkError::Database)?,
            entity_ids: serde_json::from_str(&entity_ids).map_err(|err| {
                StoreLinkError::Database(format!("task payload deserialization: {err}"))
            })?,
            status: TaskStatus::from_str(&status).map_err(StoreLinkError::Database)?,
            failed_count: row.get(4).map_err(map_sql_error)?,
            last_error: row.get(5).map_err(map_sql_error)?,
            created_at: row.get(6).map_err(map_sql_error)?,
            updated_at: row.get(7).map_err(map_sql_error)?,
        })
    })();

    Ok(task)
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
