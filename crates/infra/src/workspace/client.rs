//! HTTP implementation of the [`WorkspaceApi`] port.
//!
//! One collection per entity kind. Every write carries the installation's
//! webhook id so the workspace suppresses echoing the change back; every
//! failed exchange is captured in full (method, URL, request body, status,
//! response body) for diagnostics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use storelink_core::sync::ports::WorkspaceApi;
use storelink_domain::constants::IGNORE_WEBHOOK_PARAM;
use storelink_domain::{ApiError, ApiExchange, EntityKind, RemoteRecord, WorkspaceConfig};
use tracing::{debug, instrument};

use crate::http::HttpClient;

pub struct WorkspaceClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    webhook_id: String,
}

impl WorkspaceClient {
    pub fn new(config: &WorkspaceConfig) -> Result<Self, ApiError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .max_attempts(3)
            .user_agent(concat!("storelink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ApiError::Config(err.to_string()))?;

        Ok(Self::with_http_client(config, http))
    }

    /// Build on an existing [`HttpClient`], keeping its retry and timeout
    /// configuration.
    pub fn with_http_client(config: &WorkspaceConfig, http: HttpClient) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            webhook_id: config.webhook_id.clone(),
        }
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}{}", self.base_url, kind.collection())
    }

    fn record_url(&self, kind: EntityKind, remote_id: &str) -> String {
        format!("{}{}/{remote_id}", self.base_url, kind.collection())
    }

    fn authed(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.api_key)
    }

    /// Writes carry the webhook suppression parameter; reads do not.
    fn write(&self, method: Method, url: &str) -> RequestBuilder {
        self.authed(method, url).query(&[(IGNORE_WEBHOOK_PARAM, self.webhook_id.as_str())])
    }

    async fn execute(
        &self,
        method: &str,
        url: &str,
        request_body: Option<Value>,
        builder: RequestBuilder,
    ) -> Result<(StatusCode, Value, Option<ApiExchange>), ApiError> {
        let response =
            self.http.send(builder).await.map_err(|err| ApiError::Network(err.to_string()))?;
        let status = response.status();
        let body = read_body(response).await?;

        if status.is_success() {
            Ok((status, body, None))
        } else {
            debug!(method, url, %status, "workspace rejected the request");
            let exchange = ApiExchange {
                method: method.to_string(),
                url: url.to_string(),
                request_body,
                status: Some(status.as_u16()),
                response_body: Some(body.clone()),
            };
            Ok((status, body, Some(exchange)))
        }
    }

    async fn send_record(
        &self,
        method: Method,
        url: String,
        payload: &Value,
    ) -> Result<RemoteRecord, ApiError> {
        let builder = self.write(method.clone(), &url).json(payload);
        let (_, body, exchange) =
            self.execute(method.as_str(), &url, Some(payload.clone()), builder).await?;
        match exchange {
            None => decode_record(body),
            Some(exchange) => Err(failure(exchange)),
        }
    }
}

#[async_trait]
impl WorkspaceApi for WorkspaceClient {
    #[instrument(skip(self, payload))]
    async fn create(&self, kind: EntityKind, payload: &Value) -> Result<RemoteRecord, ApiError> {
        self.send_record(Method::POST, self.collection_url(kind), payload).await
    }

    #[instrument(skip(self, payload))]
    async fn update(
        &self,
        kind: EntityKind,
        remote_id: &str,
        payload: &Value,
    ) -> Result<RemoteRecord, ApiError> {
        self.send_record(Method::PUT, self.record_url(kind, remote_id), payload).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, kind: EntityKind, remote_id: &str) -> Result<(), ApiError> {
        let url = self.record_url(kind, remote_id);
        let builder = self.write(Method::DELETE, &url);
        let (_, _, exchange) = self.execute("DELETE", &url, None, builder).await?;
        match exchange {
            None => Ok(()),
            Some(exchange) => Err(failure(exchange)),
        }
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        kind: EntityKind,
        criteria: &[(String, String)],
    ) -> Result<Vec<RemoteRecord>, ApiError> {
        let url = self.collection_url(kind);
        let builder = self.authed(Method::GET, &url).query(criteria);
        let (_, body, exchange) = self.execute("GET", &url, None, builder).await?;
        match exchange {
            None => decode_records(body),
            Some(exchange) => Err(failure(exchange)),
        }
    }

    #[instrument(skip(self))]
    async fn search_order_items(
        &self,
        order_remote_id: &str,
        criteria: &[(String, String)],
    ) -> Result<Vec<RemoteRecord>, ApiError> {
        let url = format!("{}/orders/{order_remote_id}/items", self.base_url);
        let builder = self.authed(Method::GET, &url).query(criteria);
        let (_, body, exchange) = self.execute("GET", &url, None, builder).await?;
        match exchange {
            None => decode_records(body),
            Some(exchange) => Err(failure(exchange)),
        }
    }
}

async fn read_body(response: Response) -> Result<Value, ApiError> {
    let text = response
        .text()
        .await
        .map_err(|err| ApiError::Network(format!("failed to read response body: {err}")))?;
    if text.is_empty() {
        return Ok(Value::Null);
    }
    // Non-JSON bodies are kept verbatim so diagnostics never lose them.
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn decode_record(body: Value) -> Result<RemoteRecord, ApiError> {
    serde_json::from_value(body)
        .map_err(|err| ApiError::Decode(format!("malformed remote record: {err}")))
}

fn decode_records(body: Value) -> Result<Vec<RemoteRecord>, ApiError> {
    serde_json::from_value(body)
        .map_err(|err| ApiError::Decode(format!("malformed remote record list: {err}")))
}

fn failure(exchange: ApiExchange) -> ApiError {
    match exchange.status {
        Some(400) => ApiError::Validation { exchange },
        Some(404) => ApiError::NotFound { exchange },
        _ => ApiError::Status { exchange },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> WorkspaceClient {
        let config = WorkspaceConfig {
            base_url: server.uri(),
            api_key: "key-1".to_string(),
            integration_id: "ws-1".to_string(),
            webhook_id: "wh-1".to_string(),
            events_enabled: true,
        };
        let http = HttpClient::builder()
            .max_attempts(1)
            .base_backoff(Duration::from_millis(1))
            .build()
            .expect("client built");
        WorkspaceClient::with_http_client(&config, http)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_posts_to_the_collection_with_webhook_suppression() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(query_param("ignoreWebhookId", "wh-1"))
            .and(header("authorization", "Bearer key-1"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "R1", "orderNumber": "1001"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let record = client
            .create(EntityKind::Order, &json!({"orderNumber": "1001"}))
            .await
            .expect("record created");

        assert_eq!(record.id, "R1");
        assert_eq!(record.attributes["orderNumber"], "1001");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn validation_rejection_captures_the_full_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "violations": [{"propertyPath": "externalSourceSyncId", "message": "already exists"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .create(EntityKind::Order, &json!({"orderNumber": "1001"}))
            .await
            .unwrap_err();

        assert!(err.names_external_source_conflict());
        let exchange = err.exchange().expect("exchange captured");
        assert_eq!(exchange.method, "POST");
        assert_eq!(exchange.status, Some(400));
        assert_eq!(exchange.request_body, Some(json!({"orderNumber": "1001"})));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn vanished_record_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/orders/R-stale"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not Found"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err =
            client.update(EntityKind::Order, "R-stale", &json!({"status": "paid"})).await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn other_statuses_map_to_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/order_items/R7"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream broke"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.delete(EntityKind::OrderItem, "R7").await.unwrap_err();

        match err {
            ApiError::Status { exchange } => {
                assert_eq!(exchange.status, Some(500));
                assert_eq!(exchange.response_body, Some(json!("upstream broke")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn successful_delete_returns_unit() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/products/R9"))
            .and(query_param("ignoreWebhookId", "wh-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.delete(EntityKind::Product, "R9").await.expect("deleted");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_passes_criteria_and_decodes_the_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(query_param("externalSourceSyncId", "42"))
            .and(query_param("itemsPerPage", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "R1", "orderNumber": "1001"}])),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let records = client
            .search(
                EntityKind::Order,
                &[
                    ("externalSourceSyncId".to_string(), "42".to_string()),
                    ("itemsPerPage".to_string(), "1".to_string()),
                ],
            )
            .await
            .expect("search succeeded");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "R1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn order_item_search_targets_the_nested_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/R-order/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let records = client
            .search_order_items("R-order", &[])
            .await
            .expect("search succeeded");

        assert!(records.is_empty());
    }
}
