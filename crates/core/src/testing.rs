//! In-memory fakes shared by the unit tests in this crate.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use storelink_domain::{
    ApiError, ApiExchange, BackgroundTask, EntityKind, Order, OrderItem, Product, RemoteRecord,
    Result, StoreLinkError, TaskKind, TaskStatus,
};

use crate::commerce::ports::CommerceStore;
use crate::sync::ports::{SyncMetadataRepository, TaskQueue, WorkspaceApi};

pub fn sample_order(id: i64) -> Order {
    Order {
        id,
        number: format!("10{id}"),
        status: "paid".to_string(),
        email: "buyer@example.test".to_string(),
        total: 25.5,
    }
}

pub fn sample_order_item(id: i64, order_id: i64, product_id: Option<i64>) -> OrderItem {
    OrderItem {
        id,
        order_id,
        name: "Widget".to_string(),
        quantity: 2,
        price: 9.99,
        total: 19.98,
        product_id,
    }
}

pub fn sample_product(id: i64) -> Product {
    Product {
        id,
        name: format!("Product {id}"),
        sku: format!("SKU-{id}"),
        price: 9.99,
        image_url: Some(format!("https://img.example.test/{id}.png")),
        options: vec!["blue".to_string()],
    }
}

pub fn remote_record(id: &str) -> RemoteRecord {
    RemoteRecord { id: id.to_string(), attributes: json!({}) }
}

fn exchange(status: u16, body: Value) -> ApiExchange {
    ApiExchange {
        method: "POST".to_string(),
        url: "https://api.example.test/orders".to_string(),
        request_body: Some(json!({})),
        status: Some(status),
        response_body: Some(body),
    }
}

/// A 400 whose body names `externalSourceSyncId`, as the remote service
/// reports a duplicate-identity conflict.
pub fn validation_conflict() -> ApiError {
    ApiError::Validation {
        exchange: exchange(
            400,
            json!({"violations": [{"propertyPath": "externalSourceSyncId", "message": "already exists"}]}),
        ),
    }
}

pub fn not_found_error() -> ApiError {
    ApiError::NotFound { exchange: exchange(404, json!({"detail": "Not Found"})) }
}

pub fn status_error(status: u16) -> ApiError {
    ApiError::Status { exchange: exchange(status, json!({"detail": "error"})) }
}

#[derive(Default)]
pub struct InMemoryMetadata {
    remote_ids: Mutex<HashMap<(EntityKind, i64), String>>,
    fingerprints: Mutex<HashMap<(EntityKind, i64), String>>,
}

#[async_trait]
impl SyncMetadataRepository for InMemoryMetadata {
    async fn get_remote_id(&self, kind: EntityKind, local_id: i64) -> Result<Option<String>> {
        Ok(self.remote_ids.lock().unwrap().get(&(kind, local_id)).cloned())
    }

    async fn set_remote_id(&self, kind: EntityKind, local_id: i64, remote_id: &str) -> Result<()> {
        self.remote_ids.lock().unwrap().insert((kind, local_id), remote_id.to_string());
        Ok(())
    }

    async fn clear_remote_id(&self, kind: EntityKind, local_id: i64) -> Result<()> {
        self.remote_ids.lock().unwrap().remove(&(kind, local_id));
        Ok(())
    }

    async fn get_fingerprint(&self, kind: EntityKind, local_id: i64) -> Result<Option<String>> {
        Ok(self.fingerprints.lock().unwrap().get(&(kind, local_id)).cloned())
    }

    async fn set_fingerprint(
        &self,
        kind: EntityKind,
        local_id: i64,
        fingerprint: &str,
    ) -> Result<()> {
        self.fingerprints.lock().unwrap().insert((kind, local_id), fingerprint.to_string());
        Ok(())
    }

    async fn clear_fingerprint(&self, kind: EntityKind, local_id: i64) -> Result<()> {
        self.fingerprints.lock().unwrap().remove(&(kind, local_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    orders: Mutex<BTreeMap<i64, Order>>,
    items: Mutex<BTreeMap<i64, OrderItem>>,
    products: Mutex<BTreeMap<i64, Product>>,
    notes: Mutex<Vec<(i64, String)>>,
    fail_product_reads: AtomicBool,
}

impl FakeStore {
    pub fn insert_order(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn insert_order_item(&self, item: OrderItem) {
        self.items.lock().unwrap().insert(item.id, item);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.lock().unwrap().insert(product.id, product);
    }

    pub fn fail_product_reads(&self) {
        self.fail_product_reads.store(true, Ordering::SeqCst);
    }

    pub fn notes(&self) -> Vec<(i64, String)> {
        self.notes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommerceStore for FakeStore {
    async fn order(&self, order_id: i64) -> Result<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&order_id).cloned())
    }

    async fn order_item(&self, item_id: i64) -> Result<Option<OrderItem>> {
        Ok(self.items.lock().unwrap().get(&item_id).cloned())
    }

    async fn order_items(&self, order_id: i64) -> Result<Vec<OrderItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn product(&self, product_id: i64) -> Result<Option<Product>> {
        if self.fail_product_reads.load(Ordering::SeqCst) {
            return Err(StoreLinkError::Database("product table unavailable".to_string()));
        }
        Ok(self.products.lock().unwrap().get(&product_id).cloned())
    }

    async fn order_items_referencing_product(&self, product_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|item| item.product_id == Some(product_id))
            .map(|item| item.id)
            .collect())
    }

    async fn add_order_note(&self, order_id: i64, note: &str) -> Result<()> {
        self.notes.lock().unwrap().push((order_id, note.to_string()));
        Ok(())
    }
}

#[derive(Debug)]
pub enum ApiCall {
    Create { kind: EntityKind, payload: Value },
    Update { kind: EntityKind, remote_id: String, payload: Value },
    Delete { kind: EntityKind, remote_id: String },
    Search { kind: EntityKind, criteria: Vec<(String, String)> },
    SearchOrderItems { order_remote_id: String, criteria: Vec<(String, String)> },
}

/// Workspace API fake. Responses can be scripted per call kind; when no
/// response is queued the call succeeds with a generated remote id.
#[derive(Default)]
pub struct ScriptedApi {
    create_responses: Mutex<VecDeque<std::result::Result<RemoteRecord, ApiError>>>,
    update_responses: Mutex<VecDeque<std::result::Result<RemoteRecord, ApiError>>>,
    delete_responses: Mutex<VecDeque<std::result::Result<(), ApiError>>>,
    search_responses: Mutex<VecDeque<std::result::Result<Vec<RemoteRecord>, ApiError>>>,
    calls: Mutex<Vec<ApiCall>>,
    next_id: AtomicU64,
}

impl ScriptedApi {
    pub fn push_create(&self, response: std::result::Result<RemoteRecord, ApiError>) {
        self.create_responses.lock().unwrap().push_back(response);
    }

    pub fn push_update(&self, response: std::result::Result<RemoteRecord, ApiError>) {
        self.update_responses.lock().unwrap().push_back(response);
    }

    pub fn push_delete(&self, response: std::result::Result<(), ApiError>) {
        self.delete_responses.lock().unwrap().push_back(response);
    }

    pub fn push_search(&self, response: std::result::Result<Vec<RemoteRecord>, ApiError>) {
        self.search_responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn generated_record(&self) -> RemoteRecord {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        remote_record(&format!("R-gen-{n}"))
    }
}

#[async_trait]
impl WorkspaceApi for ScriptedApi {
    async fn create(
        &self,
        kind: EntityKind,
        payload: &Value,
    ) -> std::result::Result<RemoteRecord, ApiError> {
        self.calls.lock().unwrap().push(ApiCall::Create { kind, payload: payload.clone() });
        self.create_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.generated_record()))
    }

    async fn update(
        &self,
        kind: EntityKind,
        remote_id: &str,
        payload: &Value,
    ) -> std::result::Result<RemoteRecord, ApiError> {
        self.calls.lock().unwrap().push(ApiCall::Update {
            kind,
            remote_id: remote_id.to_string(),
            payload: payload.clone(),
        });
        self.update_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(remote_record(remote_id)))
    }

    async fn delete(&self, kind: EntityKind, remote_id: &str) -> std::result::Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(ApiCall::Delete { kind, remote_id: remote_id.to_string() });
        self.delete_responses.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn search(
        &self,
        kind: EntityKind,
        criteria: &[(String, String)],
    ) -> std::result::Result<Vec<RemoteRecord>, ApiError> {
        self.calls.lock().unwrap().push(ApiCall::Search { kind, criteria: criteria.to_vec() });
        self.search_responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn search_order_items(
        &self,
        order_remote_id: &str,
        criteria: &[(String, String)],
    ) -> std::result::Result<Vec<RemoteRecord>, ApiError> {
        self.calls.lock().unwrap().push(ApiCall::SearchOrderItems {
            order_remote_id: order_remote_id.to_string(),
            criteria: criteria.to_vec(),
        });
        self.search_responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Task queue fake enforcing the same transition rules as the real store.
#[derive(Default)]
pub struct InMemoryTasks {
    tasks: Mutex<Vec<BackgroundTask>>,
}

impl InMemoryTasks {
    pub fn task(&self, task_id: i64) -> Option<BackgroundTask> {
        self.tasks.lock().unwrap().iter().find(|task| task.id == task_id).cloned()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTasks {
    async fn enqueue(&self, kind: TaskKind, entity_ids: &[i64]) -> Result<i64> {
        let mut tasks = self.tasks.lock().unwrap();
        let id = tasks.len() as i64 + 1;
        let now = Utc::now().timestamp();
        tasks.push(BackgroundTask {
            id,
            kind,
            entity_ids: entity_ids.to_vec(),
            status: TaskStatus::Queued,
            failed_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get(&self, task_id: i64) -> Result<Option<BackgroundTask>> {
        Ok(self.task(task_id))
    }

    async fn set_status(&self, task_id: i64, status: TaskStatus) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| StoreLinkError::NotFound(format!("task {task_id}")))?;
        if !task.status.can_transition_to(status) {
            return Err(StoreLinkError::InvalidInput(format!(
                "task {task_id} cannot move from {} to {status}",
                task.status
            )));
        }
        task.status = status;
        task.updated_at = Utc::now().timestamp();
        Ok(())
    }

    async fn record_failures(
        &self,
        task_id: i64,
        failed_count: u32,
        last_error: Option<&str>,
    ) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| StoreLinkError::NotFound(format!("task {task_id}")))?;
        task.failed_count = failed_count;
        task.last_error = last_error.map(ToString::to_string);
        task.updated_at = Utc::now().timestamp();
        Ok(())
    }

    async fn next_queued(&self) -> Result<Option<BackgroundTask>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|task| task.status == TaskStatus::Queued)
            .cloned())
    }
}
