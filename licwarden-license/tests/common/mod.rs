//! Shared test helpers for license tests.

#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signer, SigningKey};
use licwarden_license::{Ed25519Verifier, LicenseError, LicenseResult, SignatureVerifier};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, UNIX_EPOCH};

pub const DAY: i64 = 24 * 60 * 60;

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, [u8; 32]) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key.to_bytes())
}

/// Writes `<path>.sig` holding a detached signature over the file bytes.
pub fn sign_file(signing_key: &SigningKey, path: &Path) {
    let message = std::fs::read(path).unwrap();
    let signature = signing_key.sign(&message);
    std::fs::write(
        Ed25519Verifier::signature_path(path),
        BASE64.encode(signature.to_bytes()),
    )
    .unwrap();
}

/// Sets a file's modification time to `secs` after the Unix epoch.
pub fn set_mtime(path: &Path, secs: i64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs as u64))
        .unwrap();
}

/// Writes an epoch file with `identifier` and an mtime of `epoch`.
pub fn write_epoch(path: &Path, identifier: &str, epoch: i64) {
    std::fs::write(path, format!("{identifier}\n")).unwrap();
    set_mtime(path, epoch);
}

/// Accepts every file and counts how often it was asked.
#[derive(Default)]
pub struct CountingVerifier {
    pub calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignatureVerifier for CountingVerifier {
    fn verify(&self, _path: &Path) -> LicenseResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Rejects every file.
pub struct RejectingVerifier;

impl SignatureVerifier for RejectingVerifier {
    fn verify(&self, path: &Path) -> LicenseResult<()> {
        Err(LicenseError::SignatureInvalid(path.to_path_buf()))
    }
}
