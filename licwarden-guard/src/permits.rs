//! Signed permit list.
//!
//! A permit authorizes one exact file content (by fingerprint) to replace
//! one exact protected destination. The list is a signed, line-oriented
//! file:
//!
//! ```text
//! deadbeefdeadbeefdeadbeefdeadbeef /opt/new-binary
//! ```
//!
//! The store loads lazily, at most once per process. A file that is
//! missing, not a regular file, or fails signature verification leaves the
//! store empty for the rest of the process.

use crate::error::{GuardError, GuardResult};
use crate::fingerprint::Digest128;
use licwarden_license::{LicenseError, SignatureVerifier};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Shortest acceptable line: digest, one separator, one path byte.
const MIN_LINE_LEN: usize = Digest128::HEX_LEN + 2;

/// One `{digest → authorized destination}` exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermitEntry {
    pub digest: Digest128,
    pub authorized_path: PathBuf,
}

impl PermitEntry {
    /// Parses one line, or `None` if it does not have the permit shape.
    #[must_use]
    pub fn parse_line(line: &[u8]) -> Option<Self> {
        let line = match line.iter().position(|&b| b == b'\n') {
            Some(end) => &line[..end],
            None => line,
        };
        if line.len() < MIN_LINE_LEN {
            return None;
        }

        let (digest_hex, rest) = line.split_at(Digest128::HEX_LEN);
        let digest = Digest128::from_hex(std::str::from_utf8(digest_hex).ok()?)?;

        if !rest.first()?.is_ascii_whitespace() {
            return None;
        }
        let start = rest.iter().position(|b| !b.is_ascii_whitespace())?;
        let mut path = &rest[start..];
        if !path.is_ascii() {
            return None;
        }
        if let Some(cr) = path.iter().position(|&b| b == b'\r') {
            path = &path[..cr];
        }
        if path.is_empty() {
            return None;
        }

        Some(Self {
            digest,
            authorized_path: PathBuf::from(OsStr::from_bytes(path)),
        })
    }
}

/// Parses every qualifying line; anything else is skipped.
///
/// The list grows with fallible reservations so an allocation failure
/// discards the whole parse instead of aborting the host.
pub fn parse_permits(text: &[u8]) -> GuardResult<Vec<PermitEntry>> {
    let mut entries = Vec::new();
    for line in text.split(|&b| b == b'\n') {
        let Some(entry) = PermitEntry::parse_line(line) else {
            continue;
        };
        entries
            .try_reserve(1)
            .map_err(|_| GuardError::OutOfMemory("parsing permits"))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Reads, verifies and parses a permit file.
pub fn read_permits(path: &Path, verifier: &dyn SignatureVerifier) -> GuardResult<Vec<PermitEntry>> {
    let meta = path.symlink_metadata()?;
    if !meta.file_type().is_file() {
        return Err(LicenseError::NotRegularFile(path.to_path_buf()).into());
    }

    let mut file = File::open(path)?;
    verifier.verify(path)?;

    let mut text = Vec::new();
    file.read_to_end(&mut text)?;
    parse_permits(&text)
}

#[derive(Debug)]
enum PermitState {
    Loaded(Vec<PermitEntry>),
    Unavailable,
}

/// Lazily loaded, immutable permit list.
pub struct PermitStore {
    location: PathBuf,
    verifier: Arc<dyn SignatureVerifier>,
    state: OnceLock<PermitState>,
}

impl PermitStore {
    pub fn new(location: impl Into<PathBuf>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            location: location.into(),
            verifier,
            state: OnceLock::new(),
        }
    }

    /// Loads the permit file on first use. Returns `true` if permits are
    /// available; later calls return the cached outcome.
    pub fn load(&self) -> bool {
        matches!(self.state(), PermitState::Loaded(_))
    }

    /// Has a load been attempted yet?
    #[must_use]
    pub fn is_attempted(&self) -> bool {
        self.state.get().is_some()
    }

    /// Authorized destination for `digest`. The first matching line wins.
    pub fn lookup(&self, digest: &Digest128) -> Option<&Path> {
        self.entries()
            .iter()
            .find(|e| e.digest == *digest)
            .map(|e| e.authorized_path.as_path())
    }

    /// All loaded permits (empty if unavailable).
    pub fn entries(&self) -> &[PermitEntry] {
        match self.state() {
            PermitState::Loaded(entries) => entries,
            PermitState::Unavailable => &[],
        }
    }

    fn state(&self) -> &PermitState {
        self.state.get_or_init(|| {
            match read_permits(&self.location, self.verifier.as_ref()) {
                Ok(entries) => {
                    debug!(path = %self.location.display(), count = entries.len(), "permits loaded");
                    PermitState::Loaded(entries)
                }
                Err(e) => {
                    debug!(path = %self.location.display(), error = %e, "permits unavailable");
                    PermitState::Unavailable
                }
            }
        })
    }
}

impl std::fmt::Debug for PermitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermitStore")
            .field("location", &self.location)
            .field("state", &self.state.get())
            .finish()
    }
}
