//! HTTP plumbing shared by the workspace client.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
