//! Queue driver for deferred bulk tasks.
//!
//! Polls the durable task queue on a fixed interval and hands the oldest
//! still-queued task to the [`BulkTaskHandler`]. Tasks are processed one at
//! a time; the handler itself moves the claimed task through its lifecycle.

use std::sync::Arc;
use std::time::Duration;

use storelink_core::sync::ports::TaskQueue;
use storelink_core::BulkTaskHandler;
use storelink_domain::{DriverConfig, Result as DomainResult, TaskKind};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

#[derive(Debug, Clone)]
pub struct TaskDriverConfig {
    /// Time between queue polls.
    pub poll_interval: Duration,
    /// How long `stop` waits for the background loop to finish.
    pub join_timeout: Duration,
}

impl Default for TaskDriverConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(60), join_timeout: Duration::from_secs(5) }
    }
}

impl From<&DriverConfig> for TaskDriverConfig {
    fn from(config: &DriverConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            ..Self::default()
        }
    }
}

/// Background task driver with start/stop lifecycle.
pub struct TaskDriver {
    handler: Arc<dyn BulkTaskHandler>,
    queue: Arc<dyn TaskQueue>,
    config: TaskDriverConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl TaskDriver {
    pub fn new(
        handler: Arc<dyn BulkTaskHandler>,
        queue: Arc<dyn TaskQueue>,
        config: TaskDriverConfig,
    ) -> Self {
        Self {
            handler,
            queue,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the polling loop.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(poll_interval = ?self.config.poll_interval, "starting task driver");

        // Fresh token so the driver can restart after a stop.
        self.cancellation_token = CancellationToken::new();

        let handler = Arc::clone(&self.handler);
        let queue = Arc::clone(&self.queue);
        let poll_interval = self.config.poll_interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::poll_loop(handler, queue, poll_interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("task driver started");
        Ok(())
    }

    /// Stop the polling loop gracefully.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("stopping task driver");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!("task driver stopped");
        Ok(())
    }

    /// Whether the background loop is active.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Claim and run the oldest queued task, if any. Returns whether a task
    /// was dispatched.
    pub async fn tick(&self) -> DomainResult<bool> {
        Self::process_next(&self.handler, &self.queue).await
    }

    async fn poll_loop(
        handler: Arc<dyn BulkTaskHandler>,
        queue: Arc<dyn TaskQueue>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("task driver loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(poll_interval) => {
                    match Self::process_next(&handler, &queue).await {
                        Ok(true) => debug!("task processed"),
                        Ok(false) => {}
                        Err(err) => error!(%err, "task queue poll failed"),
                    }
                }
            }
        }
    }

    async fn process_next(
        handler: &Arc<dyn BulkTaskHandler>,
        queue: &Arc<dyn TaskQueue>,
    ) -> DomainResult<bool> {
        let Some(task) = queue.next_queued().await? else {
            return Ok(false);
        };

        debug!(task_id = task.id, kind = %task.kind, orders = task.entity_ids.len(), "dispatching task");
        match task.kind {
            TaskKind::OrdersSync => {
                handler.bulk_orders_sync(&task.entity_ids, Some(task.id)).await;
            }
            TaskKind::OrdersDelete => {
                handler.delete_data(&task.entity_ids, Some(task.id)).await;
            }
        }
        Ok(true)
    }
}

impl Drop for TaskDriver {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use storelink_domain::TaskStatus;
    use tempfile::TempDir;

    use super::*;
    use crate::database::{DbManager, SqliteTaskRepository};

    /// Handler that records dispatches and walks the task through its
    /// lifecycle the way the real orchestrator does.
    struct RecordingHandler {
        queue: Arc<dyn TaskQueue>,
        dispatched: StdMutex<Vec<(TaskKind, Vec<i64>, Option<i64>)>>,
    }

    impl RecordingHandler {
        fn new(queue: Arc<dyn TaskQueue>) -> Self {
            Self { queue, dispatched: StdMutex::new(Vec::new()) }
        }

        async fn complete(&self, task_id: Option<i64>) {
            if let Some(task_id) = task_id {
                self.queue.set_status(task_id, TaskStatus::Processing).await.unwrap();
                self.queue.set_status(task_id, TaskStatus::Processed).await.unwrap();
            }
        }
    }

    #[async_trait]
    impl BulkTaskHandler for RecordingHandler {
        async fn bulk_orders_sync(&self, order_ids: &[i64], task_id: Option<i64>) {
            self.dispatched.lock().unwrap().push((
                TaskKind::OrdersSync,
                order_ids.to_vec(),
                task_id,
            ));
            self.complete(task_id).await;
        }

        async fn delete_data(&self, order_ids: &[i64], task_id: Option<i64>) {
            self.dispatched.lock().unwrap().push((
                TaskKind::OrdersDelete,
                order_ids.to_vec(),
                task_id,
            ));
            self.complete(task_id).await;
        }
    }

    async fn setup() -> (Arc<RecordingHandler>, Arc<dyn TaskQueue>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager =
            Arc::new(DbManager::new(temp_dir.path().join("driver.db"), 4).expect("manager"));
        manager.run_migrations().expect("migrations run");

        let queue: Arc<dyn TaskQueue> = Arc::new(SqliteTaskRepository::new(manager));
        let handler = Arc::new(RecordingHandler::new(Arc::clone(&queue)));
        (handler, queue, temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tick_dispatches_tasks_oldest_first() {
        let (handler, queue, _dir) = setup().await;
        let first = queue.enqueue(TaskKind::OrdersSync, &[1, 2]).await.unwrap();
        let second = queue.enqueue(TaskKind::OrdersDelete, &[3]).await.unwrap();

        let driver = TaskDriver::new(
            Arc::clone(&handler) as Arc<dyn BulkTaskHandler>,
            Arc::clone(&queue),
            TaskDriverConfig::default(),
        );

        assert!(driver.tick().await.unwrap());
        assert!(driver.tick().await.unwrap());
        assert!(!driver.tick().await.unwrap());

        let dispatched = handler.dispatched.lock().unwrap().clone();
        assert_eq!(
            dispatched,
            vec![
                (TaskKind::OrdersSync, vec![1, 2], Some(first)),
                (TaskKind::OrdersDelete, vec![3], Some(second)),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_is_guarded() {
        let (handler, queue, _dir) = setup().await;
        let mut driver = TaskDriver::new(
            handler as Arc<dyn BulkTaskHandler>,
            queue,
            TaskDriverConfig { poll_interval: Duration::from_millis(10), ..Default::default() },
        );

        assert!(matches!(driver.stop().await, Err(SchedulerError::NotRunning)));

        driver.start().await.expect("started");
        assert!(driver.is_running());
        assert!(matches!(driver.start().await, Err(SchedulerError::AlreadyRunning)));

        driver.stop().await.expect("stopped");
        assert!(!driver.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_loop_drains_the_queue() {
        let (handler, queue, _dir) = setup().await;
        queue.enqueue(TaskKind::OrdersSync, &[42]).await.unwrap();

        let mut driver = TaskDriver::new(
            Arc::clone(&handler) as Arc<dyn BulkTaskHandler>,
            Arc::clone(&queue),
            TaskDriverConfig { poll_interval: Duration::from_millis(10), ..Default::default() },
        );
        driver.start().await.expect("started");

        // Give the loop a few poll intervals to claim the task.
        for _ in 0..50 {
            if queue.next_queued().await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        driver.stop().await.expect("stopped");

        assert!(queue.next_queued().await.unwrap().is_none());
        assert_eq!(handler.dispatched.lock().unwrap().len(), 1);
    }
}
