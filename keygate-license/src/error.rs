//! Error types for the licensing module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Key text is malformed, the signature does not match, or the payload
    /// is inconsistent.
    #[error("invalid license key: {0}")]
    InvalidKey(String),

    /// Key is bound to a different device.
    #[error("license key is bound to a different device")]
    DeviceMismatch,

    /// System clock is earlier than the last observed time.
    ///
    /// Raised by [`ClockGuard::ensure`](crate::ClockGuard::ensure). The
    /// validator turns it into an expired state rather than returning it.
    #[error("system clock moved backwards")]
    ClockTampered,

    /// Persisted activation state could not be read back.
    #[error("activation storage corrupt: {0}")]
    StorageCorrupt(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Registry (audit log) error.
    #[error("registry error: {0}")]
    Registry(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns the kind reported across the process boundary.
    ///
    /// Clock tampering is reported as [`ErrorKind::Expired`] so the detection
    /// mechanism is not revealed to the user.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::DeviceMismatch => ErrorKind::DeviceMismatch,
            Self::ClockTampered => ErrorKind::Expired,
            Self::StorageCorrupt(_) | Self::Storage(_) | Self::Serialization(_) => {
                ErrorKind::Storage
            }
            Self::Registry(_) | Self::Config(_) => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for LicenseError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Registry(err.to_string())
    }
}

/// Serializable error kind for the UI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The key was rejected.
    InvalidKey,
    /// The key belongs to another device.
    DeviceMismatch,
    /// The license is not usable because it has expired.
    Expired,
    /// Activation state could not be written.
    Storage,
    /// Anything else.
    Internal,
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
