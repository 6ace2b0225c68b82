//! Task driver error types.

use storelink_domain::StoreLinkError;
use thiserror::Error;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task driver already running")]
    AlreadyRunning,

    #[error("task driver not running")]
    NotRunning,

    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for StoreLinkError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                StoreLinkError::InvalidInput(err.to_string())
            }
            SchedulerError::Timeout { .. } | SchedulerError::TaskJoinFailed(_) => {
                StoreLinkError::Internal(err.to_string())
            }
        }
    }
}
