//! Primary/secondary upload failover
//!
//! Attempts are sequential, never concurrent, so an object is uploaded at
//! most once. The payload is borrowed for the whole attempt chain: when both
//! backends fail the caller still owns the artifact for a later manual retry.

use std::sync::Arc;
use tracing::{debug, warn};
use ulid::Ulid;

use super::{StorageBackend, StorageLocation, StorageResult};
use crate::error::{BeaconError, Result};

/// Metadata accompanying an uploaded object
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub user_id: String,
    pub content_type: String,
    /// File extension derived from the captured container type
    pub extension: String,
}

/// Uploads through an ordered backend pair
#[derive(Clone)]
pub struct StorageUploader {
    primary: Arc<dyn StorageBackend>,
    secondary: Arc<dyn StorageBackend>,
}

impl StorageUploader {
    pub fn new(primary: Arc<dyn StorageBackend>, secondary: Arc<dyn StorageBackend>) -> Self {
        Self { primary, secondary }
    }

    fn object_key(meta: &ObjectMeta) -> String {
        format!("recordings/{}/{}.{}", meta.user_id, Ulid::new(), meta.extension)
    }

    /// Upload, falling back to the secondary backend once on any failure
    pub async fn upload(&self, data: &[u8], meta: &ObjectMeta) -> Result<StorageLocation> {
        let key = Self::object_key(meta);

        let primary_err = match self
            .primary
            .put_object(&key, data, &meta.content_type)
            .await
        {
            Ok(location) => {
                debug!(backend = self.primary.name(), %location, "upload succeeded");
                return Ok(location);
            }
            Err(e) => {
                warn!(
                    backend = self.primary.name(),
                    error = %e,
                    "primary upload failed, trying secondary"
                );
                e
            }
        };

        match self
            .secondary
            .put_object(&key, data, &meta.content_type)
            .await
        {
            Ok(location) => {
                debug!(backend = self.secondary.name(), %location, "fallback upload succeeded");
                Ok(location)
            }
            Err(secondary_err) => {
                warn!(
                    backend = self.secondary.name(),
                    error = %secondary_err,
                    "secondary upload failed"
                );
                Err(BeaconError::UploadFailed {
                    primary: primary_err.to_string(),
                    secondary: secondary_err.to_string(),
                })
            }
        }
    }

    fn backend_for(&self, location: &StorageLocation) -> Option<&Arc<dyn StorageBackend>> {
        if location.backend == self.primary.name() {
            Some(&self.primary)
        } else if location.backend == self.secondary.name() {
            Some(&self.secondary)
        } else {
            None
        }
    }

    /// Fetch a previously uploaded object from whichever backend holds it
    pub async fn fetch(&self, location: &StorageLocation) -> StorageResult<bytes::Bytes> {
        match self.backend_for(location) {
            Some(backend) => backend.fetch_object(location).await,
            None => Err(super::StorageError::UnknownBackend(
                location.backend.clone(),
            )),
        }
    }

    /// Delete a previously uploaded object
    pub async fn delete(&self, location: &StorageLocation) -> StorageResult<()> {
        match self.backend_for(location) {
            Some(backend) => backend.delete_object(location).await,
            None => Err(super::StorageError::UnknownBackend(
                location.backend.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageError, StorageResult};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted backend: fails every put when `fail` is set, counts attempts
    struct StubBackend {
        name: &'static str,
        fail: bool,
        puts: AtomicU32,
    }

    impl StubBackend {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                puts: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl StorageBackend for StubBackend {
        fn name(&self) -> &str {
            self.name
        }

        async fn put_object(
            &self,
            key: &str,
            _data: &[u8],
            _content_type: &str,
        ) -> StorageResult<StorageLocation> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StorageError::Network("connection refused".to_string()));
            }
            Ok(StorageLocation {
                backend: self.name.to_string(),
                uri: key.to_string(),
            })
        }

        async fn fetch_object(&self, _location: &StorageLocation) -> StorageResult<Bytes> {
            Ok(Bytes::from_static(b"fetched"))
        }

        async fn delete_object(&self, _location: &StorageLocation) -> StorageResult<()> {
            Ok(())
        }
    }

    fn meta() -> ObjectMeta {
        ObjectMeta {
            user_id: "u1".to_string(),
            content_type: "video/webm".to_string(),
            extension: "webm".to_string(),
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = StubBackend::new("cloud-a", false);
        let secondary = StubBackend::new("cloud-b", false);
        let uploader = StorageUploader::new(primary.clone(), secondary.clone());

        let location = uploader.upload(b"data", &meta()).await.unwrap();
        assert_eq!(location.backend, "cloud-a");
        assert!(location.uri.starts_with("recordings/u1/"));
        assert!(location.uri.ends_with(".webm"));
        assert_eq!(primary.puts.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_on_primary_failure() {
        let primary = StubBackend::new("cloud-a", true);
        let secondary = StubBackend::new("cloud-b", false);
        let uploader = StorageUploader::new(primary.clone(), secondary.clone());

        let location = uploader.upload(b"data", &meta()).await.unwrap();
        assert_eq!(location.backend, "cloud-b");
        assert_eq!(primary.puts.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_failing_surfaces_upload_failed() {
        let primary = StubBackend::new("cloud-a", true);
        let secondary = StubBackend::new("cloud-b", true);
        let uploader = StorageUploader::new(primary, secondary);

        let payload = b"artifact bytes".to_vec();
        let err = uploader.upload(&payload, &meta()).await.unwrap_err();

        match &err {
            BeaconError::UploadFailed { primary, secondary } => {
                assert!(primary.contains("connection refused"));
                assert!(secondary.contains("connection refused"));
            }
            other => panic!("expected UploadFailed, got {:?}", other),
        }

        // The borrowed payload is untouched and still usable for retry
        assert_eq!(payload, b"artifact bytes");
    }

    #[tokio::test]
    async fn test_routing_by_location() {
        let primary = StubBackend::new("cloud-a", false);
        let secondary = StubBackend::new("cloud-b", false);
        let uploader = StorageUploader::new(primary, secondary);

        let known = StorageLocation {
            backend: "cloud-b".to_string(),
            uri: "k".to_string(),
        };
        assert!(uploader.delete(&known).await.is_ok());

        let unknown = StorageLocation {
            backend: "ipfs".to_string(),
            uri: "k".to_string(),
        };
        let err = uploader.fetch(&unknown).await.unwrap_err();
        assert!(matches!(err, StorageError::UnknownBackend(_)));
    }
}
