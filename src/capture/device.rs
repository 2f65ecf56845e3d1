//! Device media capability, injected so tests can script acquisition
//!
//! Mirrors the acquire/release shape of platform media APIs. An
//! implementation that fails `acquire` must have released anything it
//! partially acquired before returning; the session never sees a handle it
//! did not receive.

use async_trait::async_trait;
use thiserror::Error;

/// Requested stream properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    /// Camera selection hint when video is requested (e.g. "environment")
    pub facing_mode: Option<String>,
}

impl MediaConstraints {
    /// Audio-only capture
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
            facing_mode: None,
        }
    }

    /// Audio plus rear-facing video
    pub fn with_video() -> Self {
        Self {
            audio: true,
            video: true,
            facing_mode: Some("environment".to_string()),
        }
    }
}

/// An acquired stream and the container type it emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: u64,
    pub mime_type: String,
}

/// Acquisition failure modes
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("media permission denied")]
    PermissionDenied,

    #[error("no capture device matching constraints")]
    NoDevice,

    #[error("device busy: {0}")]
    Busy(String),

    #[error("device failure: {0}")]
    Failure(String),
}

/// External media API seam
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Acquire a stream matching the constraints
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<StreamHandle, DeviceError>;

    /// Release an acquired stream; must be safe to call exactly once per handle
    async fn release(&self, handle: StreamHandle);
}
