//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

/// Prefix of the fixed namespace string embedded as
/// `externalSourceIntegration` on every entity created remotely.
pub const INTEGRATION_PREFIX: &str = "/workflows/";

/// Payload field the remote service names in a duplicate-identity
/// validation error.
pub const EXTERNAL_SOURCE_SYNC_ID_FIELD: &str = "externalSourceSyncId";

/// Payload field carrying the integration namespace of the installation
/// that owns a remote record.
pub const EXTERNAL_SOURCE_INTEGRATION_FIELD: &str = "externalSourceIntegration";

/// Query parameter suppressing event echo-back to this installation.
pub const IGNORE_WEBHOOK_PARAM: &str = "ignoreWebhookId";

/// Page size used when looking up a remote record by its external source
/// identity; the lookup only adopts an exact single match.
pub const LOOKUP_ITEMS_PER_PAGE: &str = "1";

// Driver defaults
pub const DEFAULT_DRIVER_POLL_SECS: u64 = 60;
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
