/*!
 * Beacon - emergency alert dispatch and protected recording core
 *
 * A resilient safety library with:
 * - Concurrent alert fan-out over trusted contacts
 * - Ordered channel failover (SMS, email, push) with per-channel timeouts
 * - Best-effort location capture with a hard upper bound
 * - Media capture sessions finalized into sized, timed artifacts
 * - Tier-gated artifact encryption (XChaCha20-Poly1305)
 * - Primary/secondary storage upload with automatic fallback
 * - Append-only, replayable persistence for alerts and recordings
 */

pub mod alert;
pub mod capture;
pub mod config;
pub mod contact;
pub mod entitlement;
pub mod error;
pub mod location;
pub mod logging;
pub mod persist;
pub mod storage;

// Re-export commonly used types
pub use alert::{Alert, AlertOrchestrator, AlertStatus, ChannelKind, DeliveryOutcome};
pub use capture::{ArtifactProtector, CaptureArtifact, CaptureSession, RecordingPipeline};
pub use config::{CoreConfig, LogLevel};
pub use contact::Contact;
pub use entitlement::{Entitlement, EntitlementGate, Tier};
pub use error::{BeaconError, Result};
pub use location::{Location, LocationResolver};
pub use storage::{StorageLocation, StorageUploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
