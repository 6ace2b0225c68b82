//! Remote workspace API types
//!
//! `RemoteRecord` is one entity as returned by the workspace; `ApiExchange`
//! captures the request/response context of a failed call so callers can log
//! diagnostics instead of re-raising raw HTTP errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::constants::EXTERNAL_SOURCE_SYNC_ID_FIELD;

/// One remote entity: its workspace id plus the raw attribute document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Value,
}

/// Request/response context of a failed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiExchange {
    pub method: String,
    pub url: String,
    pub request_body: Option<Value>,
    pub status: Option<u16>,
    pub response_body: Option<Value>,
}

impl ApiExchange {
    /// Whether the response body names the given payload field (used to
    /// detect a duplicate-identity validation error).
    pub fn mentions(&self, field: &str) -> bool {
        self.response_body.as_ref().is_some_and(|body| body.to_string().contains(field))
    }
}

/// Error returned by the workspace API port.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 400 - the remote service rejected the payload
    #[error("validation rejected by workspace: {} {}", exchange.method, exchange.url)]
    Validation { exchange: ApiExchange },

    /// HTTP 404 - the remote record no longer exists
    #[error("remote record not found: {} {}", exchange.method, exchange.url)]
    NotFound { exchange: ApiExchange },

    /// Any other non-success HTTP status
    #[error("workspace returned {status}: {} {}", exchange.method, exchange.url, status = exchange.status.unwrap_or_default())]
    Status { exchange: ApiExchange },

    /// Transport-level failure (connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("failed to decode workspace response: {0}")]
    Decode(String),

    /// Client construction or configuration failure
    #[error("workspace client configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// The captured exchange, when the failure produced a response.
    pub fn exchange(&self) -> Option<&ApiExchange> {
        match self {
            Self::Validation { exchange } | Self::NotFound { exchange } | Self::Status { exchange } => {
                Some(exchange)
            }
            Self::Network(_) | Self::Decode(_) | Self::Config(_) => None,
        }
    }

    /// Whether this is the duplicate-identity conflict the sync flow can
    /// self-heal from: a validation error whose body names
    /// `externalSourceSyncId`.
    pub fn names_external_source_conflict(&self) -> bool {
        matches!(self, Self::Validation { exchange } if exchange.mentions(EXTERNAL_SOURCE_SYNC_ID_FIELD))
    }
}
