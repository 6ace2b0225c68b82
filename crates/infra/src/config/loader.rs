//! Configuration loader.
//!
//! Loads application configuration from environment variables or a TOML
//! file.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from a file
//! 3. Probes multiple paths for config files
//!
//! ## Environment Variables
//! - `STORELINK_DB_PATH`: metadata database file path
//! - `STORELINK_DB_POOL_SIZE`: connection pool size (optional)
//! - `STORELINK_API_BASE_URL`: workspace API base URL
//! - `STORELINK_API_KEY`: bearer token for the workspace API
//! - `STORELINK_INTEGRATION_ID`: integration instance identifier
//! - `STORELINK_WEBHOOK_ID`: webhook identity for echo suppression
//! - `STORELINK_EVENTS_ENABLED`: initial events gate state (optional)
//! - `STORELINK_DRIVER_POLL_SECS`: task driver poll interval (optional)
//!
//! ## File Locations
//! The loader probes `storelink.toml` and `config.toml` in the current
//! working directory, then in its parent and grandparent, then next to the
//! executable.

use std::path::{Path, PathBuf};

use storelink_domain::constants::{DEFAULT_DB_POOL_SIZE, DEFAULT_DRIVER_POLL_SECS};
use storelink_domain::{
    Config, DatabaseConfig, DriverConfig, Result, StoreLinkError, WorkspaceConfig,
};

const CONFIG_FILE_NAMES: [&str; 2] = ["storelink.toml", "config.toml"];

/// Load configuration with automatic fallback strategy.
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(err) => {
            tracing::debug!(error = ?err, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// All required variables must be present; the pool size, events gate and
/// driver interval fall back to their defaults.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("STORELINK_DB_PATH")?;
    let pool_size = match std::env::var("STORELINK_DB_POOL_SIZE") {
        Ok(value) => value.parse::<u32>().map_err(|err| {
            StoreLinkError::Config(format!("invalid STORELINK_DB_POOL_SIZE: {err}"))
        })?,
        Err(_) => DEFAULT_DB_POOL_SIZE,
    };

    let base_url = env_var("STORELINK_API_BASE_URL")?;
    let api_key = env_var("STORELINK_API_KEY")?;
    let integration_id = env_var("STORELINK_INTEGRATION_ID")?;
    let webhook_id = env_var("STORELINK_WEBHOOK_ID")?;
    let events_enabled = env_bool("STORELINK_EVENTS_ENABLED", true);

    let poll_interval_secs = match std::env::var("STORELINK_DRIVER_POLL_SECS") {
        Ok(value) => value.parse::<u64>().map_err(|err| {
            StoreLinkError::Config(format!("invalid STORELINK_DRIVER_POLL_SECS: {err}"))
        })?,
        Err(_) => DEFAULT_DRIVER_POLL_SECS,
    };

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size },
        workspace: WorkspaceConfig {
            base_url,
            api_key,
            integration_id,
            webhook_id,
            events_enabled,
        },
        driver: DriverConfig { poll_interval_secs },
    })
}

/// Load configuration from a TOML file.
///
/// If `path` is `None`, probes the standard locations.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StoreLinkError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StoreLinkError::Config(
                "no config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|err| StoreLinkError::Config(format!("failed to read config file: {err}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    toml::from_str(contents).map_err(|err| {
        StoreLinkError::Config(format!("invalid config file {}: {err}", path.display()))
    })
}

fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    for base in [".", "..", "../.."] {
        for name in CONFIG_FILE_NAMES {
            candidates.push(Path::new(base).join(name));
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            for name in CONFIG_FILE_NAMES {
                candidates.push(dir.join(name));
            }
        }
    }

    candidates.into_iter().find(|candidate| candidate.exists())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| StoreLinkError::Config(format!("missing environment variable {name}")))
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
