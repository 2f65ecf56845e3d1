//! Storage of record for alerts, recordings, and trusted contacts
//!
//! The gateway is the only component with storage-of-record responsibility.
//! Writes are atomic per record and durable before the call returns; an
//! alert's pending write completing is the precondition for dispatch.

pub mod journal;
pub mod memory;

pub use journal::JournalStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use ulid::Ulid;

use crate::alert::Alert;
use crate::capture::StoredRecording;
use crate::contact::Contact;
use crate::error::BeaconError;

/// Errors from the metadata store
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("journal corrupt at line {line}: {message}")]
    Corrupt { line: usize, message: String },
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<PersistenceError> for BeaconError {
    fn from(err: PersistenceError) -> Self {
        BeaconError::Persistence(err.to_string())
    }
}

pub type PersistResult<T> = std::result::Result<T, PersistenceError>;

/// Append/update interface for the durable audit trail
///
/// Listing queries return newest records first.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Durably persist a new alert in its pending state
    async fn create_alert(&self, alert: &Alert) -> PersistResult<()>;

    /// Persist an alert's terminal state; rejects a second terminal write
    async fn finalize_alert(&self, alert: &Alert) -> PersistResult<()>;

    async fn alert(&self, id: Ulid) -> PersistResult<Option<Alert>>;

    async fn alerts_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> PersistResult<Vec<Alert>>;

    /// Persist a recording's metadata after a successful upload
    async fn save_recording(&self, recording: &StoredRecording) -> PersistResult<()>;

    async fn recording(&self, id: Ulid) -> PersistResult<Option<StoredRecording>>;

    async fn recordings_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> PersistResult<Vec<StoredRecording>>;

    async fn delete_recording(&self, user_id: &str, id: Ulid) -> PersistResult<()>;

    async fn contacts_for_user(&self, user_id: &str) -> PersistResult<Vec<Contact>>;

    async fn upsert_contact(&self, user_id: &str, contact: &Contact) -> PersistResult<()>;

    async fn delete_contact(&self, user_id: &str, id: Ulid) -> PersistResult<()>;
}
