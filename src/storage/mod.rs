//! Object storage abstraction for recording artifacts
//!
//! Backends sit behind one async trait; the uploader owns primary/secondary
//! ordering and failover. The core ships a filesystem-rooted backend; network
//! backends are the embedding application's concern behind the same trait.

pub mod local;
pub mod uploader;

pub use local::LocalStorageBackend;
pub use uploader::{ObjectMeta, StorageUploader};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

use crate::error::BeaconError;

/// Opaque handle to an uploaded object, usable for later fetch or delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Name of the backend holding the object
    pub backend: String,
    /// Backend-specific object URI
    pub uri: String,
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.uri)
    }
}

/// Errors from a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("no backend named {0}")]
    UnknownBackend(String),

    #[error("backend {backend} error: {message}")]
    Backend { backend: String, message: String },
}

impl StorageError {
    /// Check if this error is retriable (transient)
    pub fn is_retriable(&self) -> bool {
        match self {
            StorageError::Network(_) => true,
            StorageError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            StorageError::Backend { .. } => true,

            StorageError::QuotaExceeded(_) => false,
            StorageError::AuthenticationFailed(_) => false,
            StorageError::NotFound(_) => false,
            StorageError::UnknownBackend(_) => false,
        }
    }
}

impl From<StorageError> for BeaconError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => BeaconError::Io(e),
            other => BeaconError::Storage(other.to_string()),
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// One object storage implementation
///
/// `put_object` borrows the payload: a failed upload never consumes the
/// caller's bytes.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend identifier recorded in [`StorageLocation`]
    fn name(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> StorageResult<StorageLocation>;

    async fn fetch_object(&self, location: &StorageLocation) -> StorageResult<Bytes>;

    async fn delete_object(&self, location: &StorageLocation) -> StorageResult<()>;
}
