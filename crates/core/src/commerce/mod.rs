//! Commerce-side abstractions over local order and product storage.

pub mod ports;

pub use ports::CommerceStore;
