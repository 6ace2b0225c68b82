//! Error type shared by the sync services.

use storelink_domain::{ApiError, ApiExchange, StoreLinkError};
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure of a single sync operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The caller referenced an entity that does not exist locally.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A dependency the operation needs is not in place yet, e.g. an order
    /// item whose parent order has no remote link. Retried naturally once
    /// the dependency syncs.
    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),

    /// The remote exchange itself failed. Carries the request/response
    /// snapshot when one was captured.
    #[error("synchronization failed: {message}")]
    Synchronization {
        message: String,
        exchange: Option<ApiExchange>,
    },
}

impl SyncError {
    /// The request/response snapshot of the failed exchange, when captured.
    pub fn exchange(&self) -> Option<&ApiExchange> {
        match self {
            Self::Synchronization { exchange, .. } => exchange.as_ref(),
            _ => None,
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        let message = err.to_string();
        let exchange = err.exchange().cloned();
        Self::Synchronization { message, exchange }
    }
}

impl From<StoreLinkError> for SyncError {
    fn from(err: StoreLinkError) -> Self {
        Self::Synchronization {
            message: err.to_string(),
            exchange: None,
        }
    }
}
