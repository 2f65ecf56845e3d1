/*!
 * Error types for Beacon
 */

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, BeaconError>;

#[derive(Debug)]
pub enum BeaconError {
    /// No resolvable user context; the operation performed no side effects
    NotAuthenticated,

    /// The user's tier does not unlock the requested capability
    NotEntitled { capability: String },

    /// Capture device could not be acquired
    DeviceUnavailable(String),

    /// Operation invoked outside its legal state
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Both storage backends rejected the upload; the artifact is retained
    UploadFailed { primary: String, secondary: String },

    /// Storage fetch/delete failure outside the upload path
    Storage(String),

    /// Metadata store failure
    Persistence(String),

    /// Artifact encryption or decryption failure
    Protection(String),

    /// Key store failure
    KeyStore(String),

    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),

    /// Generic error with message
    Other(String),
}

impl BeaconError {
    /// Check if this error is fatal (retrying the same call cannot succeed)
    pub fn is_fatal(&self) -> bool {
        match self {
            BeaconError::NotAuthenticated => true,
            BeaconError::NotEntitled { .. } => true,
            BeaconError::InvalidState { .. } => true,
            BeaconError::Config(_) => true,

            // Device, upload, and store failures may clear up on retry
            BeaconError::DeviceUnavailable(_) => false,
            BeaconError::UploadFailed { .. } => false,
            BeaconError::Storage(_) => false,
            BeaconError::Persistence(_) => false,
            BeaconError::Protection(_) => false,
            BeaconError::KeyStore(_) => false,
            BeaconError::Io(_) => false,
            BeaconError::Other(_) => false,
        }
    }

    /// Get error category for logging and instrumentation
    pub fn category(&self) -> ErrorCategory {
        match self {
            BeaconError::NotAuthenticated => ErrorCategory::Auth,
            BeaconError::NotEntitled { .. } => ErrorCategory::Entitlement,
            BeaconError::DeviceUnavailable(_) => ErrorCategory::Device,
            BeaconError::InvalidState { .. } => ErrorCategory::State,
            BeaconError::UploadFailed { .. } | BeaconError::Storage(_) => ErrorCategory::Storage,
            BeaconError::Persistence(_) => ErrorCategory::Persistence,
            BeaconError::Protection(_) | BeaconError::KeyStore(_) => ErrorCategory::Protection,
            BeaconError::Config(_) => ErrorCategory::Configuration,
            BeaconError::Io(_) => ErrorCategory::IoError,
            BeaconError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid user context
    Auth,
    /// Capability not unlocked by the user's tier
    Entitlement,
    /// Capture device acquisition
    Device,
    /// Illegal state transitions
    State,
    /// Object storage upload/fetch/delete
    Storage,
    /// Metadata store of record
    Persistence,
    /// Encryption and key handling
    Protection,
    /// Configuration errors
    Configuration,
    /// I/O operation errors
    IoError,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Auth => write!(f, "auth"),
            ErrorCategory::Entitlement => write!(f, "entitlement"),
            ErrorCategory::Device => write!(f, "device"),
            ErrorCategory::State => write!(f, "state"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Persistence => write!(f, "persistence"),
            ErrorCategory::Protection => write!(f, "protection"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for BeaconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeaconError::NotAuthenticated => {
                write!(f, "Not authenticated: no user context")
            }
            BeaconError::NotEntitled { capability } => {
                write!(f, "Current tier does not allow {}", capability)
            }
            BeaconError::DeviceUnavailable(msg) => {
                write!(f, "Capture device unavailable: {}", msg)
            }
            BeaconError::InvalidState { operation, state } => {
                write!(f, "Cannot {} while session is {}", operation, state)
            }
            BeaconError::UploadFailed { primary, secondary } => {
                write!(
                    f,
                    "Upload failed on both backends: primary: {}; secondary: {}",
                    primary, secondary
                )
            }
            BeaconError::Storage(msg) => {
                write!(f, "Storage error: {}", msg)
            }
            BeaconError::Persistence(msg) => {
                write!(f, "Persistence error: {}", msg)
            }
            BeaconError::Protection(msg) => {
                write!(f, "Protection error: {}", msg)
            }
            BeaconError::KeyStore(msg) => {
                write!(f, "Key store error: {}", msg)
            }
            BeaconError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            BeaconError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            BeaconError::Other(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for BeaconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BeaconError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BeaconError {
    fn from(err: io::Error) -> Self {
        BeaconError::Io(err)
    }
}

impl From<serde_json::Error> for BeaconError {
    fn from(err: serde_json::Error) -> Self {
        BeaconError::Persistence(format!("JSON error: {}", err))
    }
}
