//! Remote workspace API client.

pub mod client;

pub use client::WorkspaceClient;
