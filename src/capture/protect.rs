//! Tier-gated artifact protection
//!
//! Encrypts a finalized artifact as one unit with XChaCha20-Poly1305 when the
//! entitlement requires it. The symmetric key goes into a [`KeyStore`] and
//! only an opaque [`KeyRef`] travels onward; the key never shares a record
//! with the ciphertext's storage location.

use async_trait::async_trait;
use bytes::Bytes;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::session::CaptureArtifact;
use crate::entitlement::Entitlement;
use crate::error::{BeaconError, Result};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

/// Opaque reference to a stored key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyRef(String);

impl KeyRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access-controlled key material store, separate from recording metadata
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn store_key(&self, key: &[u8; KEY_LEN]) -> Result<KeyRef>;
    async fn load_key(&self, key_ref: &KeyRef) -> Result<[u8; KEY_LEN]>;
}

/// Artifact bytes after protection, plain or sealed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedArtifact {
    pub mime_type: String,
    pub data: Bytes,
    pub encrypted: bool,
}

/// Conditionally seals artifacts based on entitlement
#[derive(Clone)]
pub struct ArtifactProtector {
    keys: Arc<dyn KeyStore>,
}

impl ArtifactProtector {
    pub fn new(keys: Arc<dyn KeyStore>) -> Self {
        Self { keys }
    }

    /// Protect a finalized artifact per the entitlement
    ///
    /// Without `encryption_required` the bytes pass through untouched and no
    /// key exists. Otherwise the full payload is sealed as one unit under a
    /// fresh key, with the random nonce prepended to the ciphertext.
    pub async fn protect(
        &self,
        artifact: &CaptureArtifact,
        entitlement: &Entitlement,
    ) -> Result<(ProtectedArtifact, Option<KeyRef>)> {
        if !entitlement.encryption_required {
            return Ok((
                ProtectedArtifact {
                    mime_type: artifact.mime_type.clone(),
                    data: artifact.data.clone(),
                    encrypted: false,
                },
                None,
            ));
        }

        let mut key = [0u8; KEY_LEN];
        fill_random(&mut key)?;
        let mut nonce = [0u8; NONCE_LEN];
        fill_random(&mut nonce)?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), artifact.data.as_ref())
            .map_err(|_| BeaconError::Protection("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        let key_ref = self.keys.store_key(&key).await?;

        Ok((
            ProtectedArtifact {
                mime_type: "application/octet-stream".to_string(),
                data: Bytes::from(sealed),
                encrypted: true,
            },
            Some(key_ref),
        ))
    }

    /// Open sealed bytes back into the original payload for playback
    pub async fn recover(&self, sealed: &[u8], key_ref: &KeyRef) -> Result<Bytes> {
        if sealed.len() < NONCE_LEN {
            return Err(BeaconError::Protection(
                "sealed payload shorter than nonce".to_string(),
            ));
        }

        let key = self.keys.load_key(key_ref).await?;
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| BeaconError::Protection("ciphertext rejected".to_string()))?;

        Ok(Bytes::from(plaintext))
    }
}

fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf)
        .map_err(|e| BeaconError::Protection(format!("entropy source failed: {}", e)))
}

/// In-memory key store for tests and single-process embedding
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: Mutex<HashMap<String, [u8; KEY_LEN]>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn store_key(&self, key: &[u8; KEY_LEN]) -> Result<KeyRef> {
        let id = new_key_id()?;
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| BeaconError::KeyStore("key store poisoned".to_string()))?;
        keys.insert(id.clone(), *key);
        Ok(KeyRef(id))
    }

    async fn load_key(&self, key_ref: &KeyRef) -> Result<[u8; KEY_LEN]> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| BeaconError::KeyStore("key store poisoned".to_string()))?;
        keys.get(key_ref.as_str())
            .copied()
            .ok_or_else(|| BeaconError::KeyStore(format!("unknown key ref: {}", key_ref)))
    }
}

/// File-per-key store with owner-only permissions
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.key", id))
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn store_key(&self, key: &[u8; KEY_LEN]) -> Result<KeyRef> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BeaconError::KeyStore(format!("create key dir: {}", e)))?;

        let id = new_key_id()?;
        let path = self.key_path(&id);
        tokio::fs::write(&path, hex::encode(key))
            .await
            .map_err(|e| BeaconError::KeyStore(format!("write key file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| BeaconError::KeyStore(format!("restrict key file: {}", e)))?;
        }

        Ok(KeyRef(id))
    }

    async fn load_key(&self, key_ref: &KeyRef) -> Result<[u8; KEY_LEN]> {
        let encoded = tokio::fs::read_to_string(self.key_path(key_ref.as_str()))
            .await
            .map_err(|_| BeaconError::KeyStore(format!("unknown key ref: {}", key_ref)))?;

        let raw = hex::decode(encoded.trim())
            .map_err(|e| BeaconError::KeyStore(format!("malformed key file: {}", e)))?;
        raw.try_into()
            .map_err(|_| BeaconError::KeyStore("key file has wrong length".to_string()))
    }
}

fn new_key_id() -> Result<String> {
    let mut id = [0u8; 16];
    fill_random(&mut id)?;
    Ok(hex::encode(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::Tier;
    use std::time::Duration;

    fn artifact(data: &'static [u8]) -> CaptureArtifact {
        CaptureArtifact {
            mime_type: "audio/webm".to_string(),
            size_bytes: data.len() as u64,
            duration: Duration::from_secs(1),
            data: Bytes::from_static(data),
        }
    }

    fn protector() -> ArtifactProtector {
        ArtifactProtector::new(Arc::new(MemoryKeyStore::new()))
    }

    #[tokio::test]
    async fn test_free_tier_passthrough() {
        let artifact = artifact(b"plain recording bytes");
        let entitlement = Entitlement::for_tier(Tier::Free);

        let (protected, key_ref) = protector().protect(&artifact, &entitlement).await.unwrap();

        assert!(!protected.encrypted);
        assert!(key_ref.is_none());
        assert_eq!(protected.data, artifact.data);
        assert_eq!(protected.mime_type, "audio/webm");
    }

    #[tokio::test]
    async fn test_premium_tier_seals() {
        let artifact = artifact(b"sensitive recording bytes");
        let entitlement = Entitlement::for_tier(Tier::Premium);

        let (protected, key_ref) = protector().protect(&artifact, &entitlement).await.unwrap();

        assert!(protected.encrypted);
        assert!(key_ref.is_some());
        assert_ne!(protected.data, artifact.data);
        // nonce + ciphertext + poly1305 tag
        assert_eq!(protected.data.len(), NONCE_LEN + artifact.data.len() + 16);
        assert_eq!(protected.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_seal_recover_round_trip() {
        let protector = protector();
        let artifact = artifact(b"round trip payload");
        let entitlement = Entitlement::for_tier(Tier::Lifetime);

        let (protected, key_ref) = protector.protect(&artifact, &entitlement).await.unwrap();
        let recovered = protector
            .recover(&protected.data, &key_ref.unwrap())
            .await
            .unwrap();

        assert_eq!(recovered, artifact.data);
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_rejected() {
        let protector = protector();
        let artifact = artifact(b"tamper target");
        let entitlement = Entitlement::for_tier(Tier::Premium);

        let (protected, key_ref) = protector.protect(&artifact, &entitlement).await.unwrap();
        let mut bytes = protected.data.to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let err = protector
            .recover(&bytes, &key_ref.unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, BeaconError::Protection(_)));
    }

    #[tokio::test]
    async fn test_unknown_key_ref() {
        let err = protector()
            .recover(&[0u8; 64], &KeyRef("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, BeaconError::KeyStore(_)));
    }

    #[tokio::test]
    async fn test_file_key_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());

        let key = [7u8; KEY_LEN];
        let key_ref = store.store_key(&key).await.unwrap();
        assert_eq!(store.load_key(&key_ref).await.unwrap(), key);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let path = dir.path().join(format!("{}.key", key_ref.as_str()));
            let mode = std::fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
