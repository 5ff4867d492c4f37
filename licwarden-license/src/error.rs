//! Error types for the license module.

use std::path::PathBuf;
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file that must be a regular file is something else (symlink, dir, ...).
    #[error("{0}: not a regular file")]
    NotRegularFile(PathBuf),

    /// Signature verification failed.
    #[error("{0}: signature check failed")]
    SignatureInvalid(PathBuf),

    /// The signature verifier itself could not run.
    #[error("signature verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// Detached signature is malformed.
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    /// Public key bytes are not a valid Ed25519 point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The install epoch file is missing or unreadable.
    #[error("install epoch unavailable: {0}")]
    EpochUnavailable(String),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
