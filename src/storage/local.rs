//! Filesystem-rooted storage backend
//!
//! Objects live under a root directory, keyed by their relative object key.
//! Fetch and delete reject URIs that escape the root.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{StorageBackend, StorageError, StorageLocation, StorageResult};

const BACKEND_NAME: &str = "local";

/// Local filesystem backend
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, location: &StorageLocation) -> StorageResult<PathBuf> {
        if location.backend != BACKEND_NAME {
            return Err(StorageError::UnknownBackend(location.backend.clone()));
        }
        let path = PathBuf::from(&location.uri);
        if !path.starts_with(&self.root) {
            return Err(StorageError::NotFound(location.uri.clone()));
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> StorageResult<StorageLocation> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        Ok(StorageLocation {
            backend: BACKEND_NAME.to_string(),
            uri: path.display().to_string(),
        })
    }

    async fn fetch_object(&self, location: &StorageLocation) -> StorageResult<Bytes> {
        let path = self.resolve(location)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.uri.clone()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn delete_object(&self, location: &StorageLocation) -> StorageResult<()> {
        let path = self.resolve(location)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.uri.clone()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Escape-hatch helper for callers that hold a raw path
impl LocalStorageBackend {
    pub fn root(&self) -> &Path {
        &self.root
    }
}
