//! Background task scheduling.

pub mod error;
pub mod task_driver;

pub use error::{SchedulerError, SchedulerResult};
pub use task_driver::{TaskDriver, TaskDriverConfig};
