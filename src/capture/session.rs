//! Capture session lifecycle
//!
//! `Idle → Capturing → Finalizing → Finalized`, or `Capturing → Aborted` on
//! device failure. Chunks are buffered in arrival order and concatenated into
//! one artifact at stop; duration is measured wall-clock from start to stop.
//! `&mut self` on every transition keeps the session single-writer.

use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::device::{MediaConstraints, MediaDevice, StreamHandle};
use crate::entitlement::Entitlement;
use crate::error::{BeaconError, Result};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Finalizing,
    Finalized,
    Aborted,
}

impl CaptureState {
    fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Capturing => "capturing",
            CaptureState::Finalizing => "finalizing",
            CaptureState::Finalized => "finalized",
            CaptureState::Aborted => "aborted",
        }
    }
}

/// Finalized product of one capture session
///
/// Transient: consumed by the protection/upload pipeline and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    pub mime_type: String,
    pub size_bytes: u64,
    pub duration: Duration,
    pub data: Bytes,
}

impl CaptureArtifact {
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Owns the lifecycle of one recording
pub struct CaptureSession {
    device: Arc<dyn MediaDevice>,
    entitlement: Entitlement,
    state: CaptureState,
    handle: Option<StreamHandle>,
    chunks: Vec<Bytes>,
    started_at: Option<Instant>,
}

impl CaptureSession {
    pub fn new(device: Arc<dyn MediaDevice>, entitlement: Entitlement) -> Self {
        Self {
            device,
            entitlement,
            state: CaptureState::Idle,
            handle: None,
            chunks: Vec::new(),
            started_at: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Acquire the device and begin buffering chunks
    pub async fn start(&mut self, video: bool) -> Result<()> {
        if self.state != CaptureState::Idle {
            return Err(BeaconError::InvalidState {
                operation: "start",
                state: self.state.name(),
            });
        }

        if video && !self.entitlement.video_allowed {
            return Err(BeaconError::NotEntitled {
                capability: "video capture".to_string(),
            });
        }

        let constraints = if video {
            MediaConstraints::with_video()
        } else {
            MediaConstraints::audio_only()
        };

        let handle = self
            .device
            .acquire(&constraints)
            .await
            .map_err(|e| BeaconError::DeviceUnavailable(e.to_string()))?;

        debug!(stream = handle.id, mime = %handle.mime_type, "capture started");
        self.handle = Some(handle);
        self.started_at = Some(Instant::now());
        self.state = CaptureState::Capturing;
        Ok(())
    }

    /// Append a media chunk in arrival order
    pub fn push_chunk(&mut self, chunk: Bytes) -> Result<()> {
        if self.state != CaptureState::Capturing {
            return Err(BeaconError::InvalidState {
                operation: "push_chunk",
                state: self.state.name(),
            });
        }
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
        Ok(())
    }

    /// Finalize the buffered chunks into one artifact and release the device
    pub async fn stop(&mut self) -> Result<CaptureArtifact> {
        if self.state != CaptureState::Capturing {
            return Err(BeaconError::InvalidState {
                operation: "stop",
                state: self.state.name(),
            });
        }
        self.state = CaptureState::Finalizing;

        let duration = self
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or_default();

        let total: usize = self.chunks.iter().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        let data = data.freeze();

        let mime_type = match self.handle.take() {
            Some(handle) => {
                let mime = handle.mime_type.clone();
                self.device.release(handle).await;
                mime
            }
            None => "video/webm".to_string(),
        };

        self.state = CaptureState::Finalized;
        debug!(
            bytes = data.len(),
            duration_ms = duration.as_millis() as u64,
            "capture finalized"
        );

        Ok(CaptureArtifact {
            mime_type,
            size_bytes: data.len() as u64,
            duration,
            data,
        })
    }

    /// Tear down after a device failure mid-capture; buffered chunks are dropped
    pub async fn abort(&mut self) -> Result<()> {
        if self.state != CaptureState::Capturing {
            return Err(BeaconError::InvalidState {
                operation: "abort",
                state: self.state.name(),
            });
        }

        warn!(chunks = self.chunks.len(), "capture aborted");
        self.chunks.clear();
        if let Some(handle) = self.handle.take() {
            self.device.release(handle).await;
        }
        self.state = CaptureState::Aborted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::device::DeviceError;
    use crate::entitlement::Tier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    struct StubDevice {
        fail_acquire: bool,
        next_id: AtomicU64,
        acquired: AtomicU32,
        released: AtomicU32,
    }

    impl StubDevice {
        fn new(fail_acquire: bool) -> Arc<Self> {
            Arc::new(Self {
                fail_acquire,
                next_id: AtomicU64::new(1),
                acquired: AtomicU32::new(0),
                released: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl MediaDevice for StubDevice {
        async fn acquire(
            &self,
            constraints: &MediaConstraints,
        ) -> std::result::Result<StreamHandle, DeviceError> {
            if self.fail_acquire {
                return Err(DeviceError::Busy("in use by another app".to_string()));
            }
            self.acquired.fetch_add(1, Ordering::SeqCst);
            let mime = if constraints.video {
                "video/webm"
            } else {
                "audio/webm"
            };
            Ok(StreamHandle {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                mime_type: mime.to_string(),
            })
        }

        async fn release(&self, _handle: StreamHandle) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn premium_session(device: Arc<StubDevice>) -> CaptureSession {
        CaptureSession::new(device, Entitlement::for_tier(Tier::Premium))
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_invalid_state() {
        let mut session = premium_session(StubDevice::new(false));
        let err = session.stop().await.unwrap_err();
        assert!(matches!(
            err,
            BeaconError::InvalidState {
                operation: "stop",
                state: "idle",
            }
        ));
    }

    #[tokio::test]
    async fn test_capture_round_trip() {
        let device = StubDevice::new(false);
        let mut session = premium_session(device.clone());

        session.start(false).await.unwrap();
        assert_eq!(session.state(), CaptureState::Capturing);

        session.push_chunk(Bytes::from_static(b"one")).unwrap();
        session.push_chunk(Bytes::from_static(b"two")).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let artifact = session.stop().await.unwrap();
        assert_eq!(session.state(), CaptureState::Finalized);
        assert_eq!(artifact.data.as_ref(), b"onetwo");
        assert_eq!(artifact.size_bytes, 6);
        assert_eq!(artifact.mime_type, "audio/webm");
        assert!(artifact.duration >= Duration::from_millis(30));
        assert!(artifact.duration < Duration::from_secs(5));
        assert_eq!(device.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_video_requires_entitlement() {
        let device = StubDevice::new(false);
        let mut session =
            CaptureSession::new(device.clone(), Entitlement::for_tier(Tier::Free));

        let err = session.start(true).await.unwrap_err();
        assert!(matches!(err, BeaconError::NotEntitled { .. }));
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(device.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_acquire_failure_leaves_session_idle() {
        let mut session = premium_session(StubDevice::new(true));
        let err = session.start(false).await.unwrap_err();
        assert!(matches!(err, BeaconError::DeviceUnavailable(_)));
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_double_start_is_invalid_state() {
        let mut session = premium_session(StubDevice::new(false));
        session.start(false).await.unwrap();
        let err = session.start(false).await.unwrap_err();
        assert!(matches!(
            err,
            BeaconError::InvalidState {
                operation: "start",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_push_after_stop_is_invalid_state() {
        let mut session = premium_session(StubDevice::new(false));
        session.start(false).await.unwrap();
        session.stop().await.unwrap();
        let err = session.push_chunk(Bytes::from_static(b"late")).unwrap_err();
        assert!(matches!(err, BeaconError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_abort_releases_device() {
        let device = StubDevice::new(false);
        let mut session = premium_session(device.clone());
        session.start(false).await.unwrap();
        session.push_chunk(Bytes::from_static(b"x")).unwrap();

        session.abort().await.unwrap();
        assert_eq!(session.state(), CaptureState::Aborted);
        assert_eq!(device.released.load(Ordering::SeqCst), 1);

        // Terminal: no restart on the same session
        let err = session.start(false).await.unwrap_err();
        assert!(matches!(err, BeaconError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_empty_chunks_are_dropped() {
        let mut session = premium_session(StubDevice::new(false));
        session.start(false).await.unwrap();
        session.push_chunk(Bytes::new()).unwrap();
        session.push_chunk(Bytes::from_static(b"a")).unwrap();
        let artifact = session.stop().await.unwrap();
        assert_eq!(artifact.data.as_ref(), b"a");
    }
}
