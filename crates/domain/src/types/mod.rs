//! Common data types used throughout the application

pub mod api;
pub mod commerce;
pub mod sync;

pub use api::*;
pub use commerce::*;
pub use sync::*;
