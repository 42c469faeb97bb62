//! Error types for the issuer.

use keygate_license::LicenseError;
use thiserror::Error;

/// Issuer errors.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// Error from the license core.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// The signing secret file is missing, malformed, or already exists.
    #[error("secret key error: {0}")]
    SecretKey(String),

    /// Invalid issuer configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for issuer operations.
pub type IssuerResult<T> = Result<T, IssuerError>;
