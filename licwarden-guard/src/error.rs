//! Error types for the guard engine.

use licwarden_license::LicenseError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors raised while building or loading guard state.
///
/// None of these reach the host program: decisions are expressed as
/// [`crate::Verdict`] values, and build/load failures degrade according to
/// the configured policy.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Filesystem or syscall failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signature verification or license file handling failed.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// A protection pattern could not be expanded.
    #[error("glob '{pattern}' failed: {reason}")]
    Glob { pattern: String, reason: String },

    /// The policy file is not valid TOML for [`crate::GuardConfig`].
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A path cannot be passed to the kernel.
    #[error("path contains an interior NUL byte: {0}")]
    InvalidPath(PathBuf),

    /// An allocation was refused while building guard state.
    #[error("out of memory while {0}")]
    OutOfMemory(&'static str),
}
