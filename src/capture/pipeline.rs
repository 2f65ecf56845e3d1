//! Finalized-artifact processing: protect, upload, persist
//!
//! The artifact is borrowed end to end; nothing is discarded until the
//! metadata record is durably written. An upload failure surfaces with the
//! caller still holding the bytes for a manual retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use ulid::Ulid;

use super::protect::{ArtifactProtector, KeyRef};
use super::session::CaptureArtifact;
use super::extension_for_mime;
use crate::entitlement::EntitlementGate;
use crate::error::{BeaconError, Result};
use crate::persist::PersistenceGateway;
use crate::storage::{ObjectMeta, StorageError, StorageLocation, StorageUploader};

/// Durable metadata for an uploaded recording
///
/// `size_bytes` and `duration_seconds` describe the captured artifact (before
/// encryption); `key_ref` is an opaque reference into the key store, never
/// key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecording {
    pub id: Ulid,
    pub user_id: String,
    pub location: StorageLocation,
    pub duration_seconds: f64,
    pub size_bytes: u64,
    pub encrypted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ref: Option<KeyRef>,

    pub created_at: DateTime<Utc>,
}

/// Carries a finalized artifact through protection, upload, and persistence
#[derive(Clone)]
pub struct RecordingPipeline {
    gate: EntitlementGate,
    protector: ArtifactProtector,
    /// Cloud backend pair, used when the tier allows cloud backup
    cloud: StorageUploader,
    /// On-device pair for tiers without cloud backup
    device: StorageUploader,
    store: Arc<dyn PersistenceGateway>,
}

impl RecordingPipeline {
    pub fn new(
        gate: EntitlementGate,
        protector: ArtifactProtector,
        cloud: StorageUploader,
        device: StorageUploader,
        store: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            gate,
            protector,
            cloud,
            device,
            store,
        }
    }

    /// Protect, upload, and persist one finalized artifact
    pub async fn save(&self, user_id: &str, artifact: &CaptureArtifact) -> Result<StoredRecording> {
        let entitlement = self.gate.resolve(user_id).await?;

        let (protected, key_ref) = self.protector.protect(artifact, &entitlement).await?;
        debug!(
            encrypted = protected.encrypted,
            bytes = protected.data.len(),
            "artifact protected"
        );

        let meta = ObjectMeta {
            user_id: user_id.to_string(),
            content_type: protected.mime_type.clone(),
            extension: extension_for_mime(&artifact.mime_type).to_string(),
        };

        let uploader = if entitlement.cloud_backup_allowed {
            &self.cloud
        } else {
            &self.device
        };
        let location = uploader.upload(&protected.data, &meta).await?;

        let recording = StoredRecording {
            id: Ulid::new(),
            user_id: user_id.to_string(),
            location,
            duration_seconds: artifact.duration_seconds(),
            size_bytes: artifact.size_bytes,
            encrypted: protected.encrypted,
            key_ref,
            created_at: Utc::now(),
        };

        self.store.save_recording(&recording).await?;
        info!(recording = %recording.id, location = %recording.location, "recording saved");
        Ok(recording)
    }

    /// Remove a recording's object and then its metadata record
    pub async fn delete(&self, user_id: &str, recording_id: Ulid) -> Result<()> {
        let recording = self
            .store
            .recording(recording_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| {
                BeaconError::Storage(format!("recording not found: {}", recording_id))
            })?;

        match self.cloud.delete(&recording.location).await {
            Ok(()) => {}
            Err(StorageError::UnknownBackend(_)) => {
                self.device
                    .delete(&recording.location)
                    .await
                    .map_err(BeaconError::from)?;
            }
            Err(e) => return Err(e.into()),
        }

        self.store.delete_recording(user_id, recording_id).await?;
        info!(recording = %recording_id, "recording deleted");
        Ok(())
    }
}
