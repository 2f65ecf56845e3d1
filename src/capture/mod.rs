//! Recording capture, protection, and persistence
//!
//! A [`CaptureSession`] turns a live media stream into one sized, timed
//! artifact; [`ArtifactProtector`] conditionally encrypts it; and
//! [`RecordingPipeline`] carries it through upload and metadata persistence
//! without ever consuming the caller's copy until the upload has succeeded.

pub mod device;
pub mod pipeline;
pub mod protect;
pub mod session;

pub use device::{DeviceError, MediaConstraints, MediaDevice, StreamHandle};
pub use pipeline::{RecordingPipeline, StoredRecording};
pub use protect::{
    ArtifactProtector, FileKeyStore, KeyRef, KeyStore, MemoryKeyStore, ProtectedArtifact,
};
pub use session::{CaptureArtifact, CaptureSession, CaptureState};

/// Container preference order for capture devices, best first
const PREFERRED_MIME_TYPES: [&str; 7] = [
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
    "video/mp4",
    "audio/webm",
    "audio/mp4",
    "audio/mpeg",
];

/// Pick the best container a device supports, defaulting to webm
///
/// Device implementations call this with their own support probe when the
/// platform exposes one.
pub fn preferred_mime_type(supports: impl Fn(&str) -> bool) -> &'static str {
    PREFERRED_MIME_TYPES
        .iter()
        .find(|mime| supports(mime))
        .copied()
        .unwrap_or("video/webm")
}

/// File extension for a captured container type, defaulting to webm
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    // Container parameters ("video/webm;codecs=vp9") do not affect the extension
    let base = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match base {
        "video/webm" | "audio/webm" => "webm",
        "video/mp4" => "mp4",
        "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        _ => "webm",
    }
}
