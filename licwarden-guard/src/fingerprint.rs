//! Content fingerprints.
//!
//! A fingerprint is the first 16 bytes of the SHA-256 of a file's content.
//! It is only ever compared for equality against a signed permit list.

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::ffi::CStr;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::mem::ManuallyDrop;
use std::os::fd::{FromRawFd, RawFd};
use std::os::unix::fs::FileExt;
use std::str::FromStr;

/// 128-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest128([u8; 16]);

impl Digest128 {
    pub const HEX_LEN: usize = 32;

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Digest of an in-memory buffer.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::from_hasher(Sha256::new_with_prefix(data))
    }

    /// Parses exactly 32 hex characters (either case).
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    fn from_hasher(hasher: Sha256) -> Self {
        let full = hasher.finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&full[..16]);
        Self(out)
    }
}

impl fmt::Display for Digest128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest128({self})")
    }
}

impl FromStr for Digest128 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut out = [0u8; 16];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl Serialize for Digest128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Digest of the file at `path`, relative to `dirfd`.
///
/// A trailing symlink is not followed: the caller has already checked the
/// entry is a regular file, and `O_NOFOLLOW` keeps a swapped-in symlink
/// from being hashed in its place.
pub fn fingerprint_at(dirfd: RawFd, path: &CStr) -> io::Result<Digest128> {
    // SAFETY: `path` is NUL-terminated; the returned fd is owned below.
    let fd = unsafe {
        libc::openat(
            dirfd,
            path.as_ptr(),
            libc::O_RDONLY | libc::O_CLOEXEC | libc::O_NOFOLLOW,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just opened and is exclusively owned by `file`.
    let mut file = unsafe { File::from_raw_fd(fd) };
    digest_reader(&mut file)
}

/// Digest of the file behind an open descriptor.
///
/// Reads with `pread` from offset zero, so the descriptor's own offset is
/// left untouched, and the descriptor is not closed.
pub fn fingerprint_fd(fd: RawFd) -> io::Result<Digest128> {
    // SAFETY: the caller keeps `fd` open; ManuallyDrop prevents closing it.
    let file = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut offset = 0u64;
    loop {
        let n = match file.read_at(&mut buf, offset) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        offset += n as u64;
    }
    Ok(Digest128::from_hasher(hasher))
}

fn digest_reader(reader: &mut impl Read) -> io::Result<Digest128> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(Digest128::from_hasher(hasher))
}
