//! Change detection over watched entity fields.
//!
//! Each entity kind declares a fixed list of watched fields. Their current
//! values are hashed into a fingerprint which is compared against the one
//! stored at the end of the last successful sync; a mismatch (or an absent
//! stored fingerprint) means the entity needs pushing.

use std::sync::Arc;

use storelink_domain::{EntityKind, Result};

use crate::sync::ports::SyncMetadataRepository;

/// Field separator fed into the hash between values so that adjacent
/// fields cannot collide by concatenation.
const FIELD_SEPARATOR: u8 = 0x1f;

#[derive(Clone)]
pub struct ChangesDetector {
    metadata: Arc<dyn SyncMetadataRepository>,
}

impl ChangesDetector {
    pub fn new(metadata: Arc<dyn SyncMetadataRepository>) -> Self {
        Self { metadata }
    }

    /// Hash the watched field values into a hex fingerprint.
    pub fn fingerprint(fields: &[String]) -> String {
        let mut hasher = blake3::Hasher::new();
        for field in fields {
            hasher.update(field.as_bytes());
            hasher.update(&[FIELD_SEPARATOR]);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Whether the entity's watched fields differ from the last locked
    /// state. An entity with no stored fingerprint is always changed.
    pub async fn is_changed(
        &self,
        kind: EntityKind,
        local_id: i64,
        fields: &[String],
    ) -> Result<bool> {
        let stored = self.metadata.get_fingerprint(kind, local_id).await?;
        Ok(stored.as_deref() != Some(Self::fingerprint(fields).as_str()))
    }

    /// Record the current watched state as synced. A no-op when the stored
    /// fingerprint already matches.
    pub async fn lock_changes(
        &self,
        kind: EntityKind,
        local_id: i64,
        fields: &[String],
    ) -> Result<()> {
        let current = Self::fingerprint(fields);
        let stored = self.metadata.get_fingerprint(kind, local_id).await?;
        if stored.as_deref() == Some(current.as_str()) {
            return Ok(());
        }
        self.metadata.set_fingerprint(kind, local_id, &current).await
    }
}
