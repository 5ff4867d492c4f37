//! Licensing state for licwarden.
//!
//! This crate owns everything that decides *how long* a protected install
//! may keep running:
//! - the install epoch, written once at first run with a random identifier
//! - the default grace period and its optional override
//! - signed license records extending the deadline for one install
//! - signature verification of the signed documents
//!
//! # Deadline
//!
//! `effective = max(epoch + grace, latest signed expiry for this install)`.
//! A missing, unsigned or malformed license never shortens the deadline
//! below the default; it simply contributes nothing.

mod deadline;
mod epoch;
mod error;
mod paths;
mod record;
mod verify;

pub use deadline::{Deadline, DeadlineTracker, FileStamp, LicenseStatus};
pub use epoch::{DEFAULT_GRACE_SECS, InstallEpoch, read_grace_secs};
pub use error::{LicenseError, LicenseResult};
pub use paths::{
    EPOCH_FILE, GPGV_PROGRAM, GRACE_FILE, KEYRING_FILE, LICENSE_DIR, LICENSE_FILE, LicensePaths,
    PERMIT_FILE,
};
pub use record::{LicenseRecord, max_expiry_for, parse_records};
pub use verify::{Ed25519Verifier, GpgvVerifier, SignatureVerifier};
