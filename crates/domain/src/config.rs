//! Configuration structures
//!
//! Deserialized by the infra loader from environment variables or a TOML
//! file; consumed by the database manager, the workspace client, and the
//! background task driver.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DB_POOL_SIZE, DEFAULT_DRIVER_POLL_SECS, INTEGRATION_PREFIX};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Local metadata database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Remote workspace connection and identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Base URL of the workspace API (e.g. "https://api.example.com/v1")
    pub base_url: String,
    /// Bearer token for API authentication
    pub api_key: String,
    /// Identifier of this integration instance within the workspace
    pub integration_id: String,
    /// This installation's webhook identity, passed on every write so the
    /// workspace suppresses echoing the change back to us
    pub webhook_id: String,
    /// Initial state of the orchestrator's events gate
    #[serde(default = "default_true")]
    pub events_enabled: bool,
}

impl WorkspaceConfig {
    /// Fixed namespace string embedded as `externalSourceIntegration` on
    /// every entity this installation creates remotely.
    pub fn integration(&self) -> String {
        format!("{INTEGRATION_PREFIX}{}", self.integration_id)
    }
}

/// Background task driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Seconds between driver ticks
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { poll_interval_secs: DEFAULT_DRIVER_POLL_SECS }
    }
}

fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

fn default_poll_secs() -> u64 {
    DEFAULT_DRIVER_POLL_SECS
}

fn default_true() -> bool {
    true
}
