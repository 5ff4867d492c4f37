//! Signature verification for the signed permit and license documents.
//!
//! Two verifiers are provided:
//! - [`GpgvVerifier`] shells out to a `gpgv`-compatible binary with a fixed
//!   keyring. Success is an exit status of zero; anything else means
//!   "not signed".
//! - [`Ed25519Verifier`] checks a detached `<file>.sig` (base64 of a 64-byte
//!   Ed25519 signature over the file bytes) against a known public key.

use crate::error::{LicenseError, LicenseResult};
use crate::paths::{GPGV_PROGRAM, KEYRING_FILE};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Decides whether a file carries a valid signature.
pub trait SignatureVerifier: Send + Sync {
    /// Returns `Ok(())` iff `path` is validly signed.
    fn verify(&self, path: &Path) -> LicenseResult<()>;
}

/// External `gpgv` invocation.
#[derive(Debug, Clone)]
pub struct GpgvVerifier {
    program: PathBuf,
    keyring: PathBuf,
}

impl Default for GpgvVerifier {
    fn default() -> Self {
        Self::new(GPGV_PROGRAM, KEYRING_FILE)
    }
}

impl GpgvVerifier {
    pub fn new(program: impl Into<PathBuf>, keyring: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            keyring: keyring.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn keyring(&self) -> &Path {
        &self.keyring
    }
}

impl SignatureVerifier for GpgvVerifier {
    fn verify(&self, path: &Path) -> LicenseResult<()> {
        let status = Command::new(&self.program)
            .arg("--keyring")
            .arg(&self.keyring)
            .arg(path)
            .env_remove("LD_PRELOAD")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                LicenseError::VerifierUnavailable(format!("{}: {e}", self.program.display()))
            })?;

        debug!(
            program = %self.program.display(),
            file = %path.display(),
            ?status,
            "gpgv finished"
        );

        if status.success() {
            Ok(())
        } else {
            Err(LicenseError::SignatureInvalid(path.to_path_buf()))
        }
    }
}

/// Detached Ed25519 signature check.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Builds a verifier from raw 32-byte public key material.
    pub fn from_bytes(bytes: &[u8; 32]) -> LicenseResult<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(|key| Self { key })
            .map_err(|_| LicenseError::InvalidPublicKey)
    }

    /// Builds a verifier from a hex-encoded public key.
    pub fn from_hex(hex_key: &str) -> LicenseResult<Self> {
        let raw = hex::decode(hex_key.trim()).map_err(|_| LicenseError::InvalidPublicKey)?;
        let bytes: [u8; 32] = raw.try_into().map_err(|_| LicenseError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// Location of the detached signature belonging to `path`.
    pub fn signature_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".sig");
        PathBuf::from(name)
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, path: &Path) -> LicenseResult<()> {
        let message = std::fs::read(path)?;
        let encoded = std::fs::read_to_string(Self::signature_path(path))?;

        let sig_bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| LicenseError::InvalidSignatureEncoding(e.to_string()))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| LicenseError::InvalidSignatureEncoding("bad length".to_string()))?;

        self.key
            .verify(&message, &signature)
            .map_err(|_| LicenseError::SignatureInvalid(path.to_path_buf()))
    }
}
