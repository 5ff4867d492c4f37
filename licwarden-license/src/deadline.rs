//! Deadline computation.
//!
//! The effective deadline is the later of:
//! - the default deadline: install epoch + grace period, and
//! - the signed deadline: the latest license record for this install.
//!
//! The tracker re-reads its inputs on every [`DeadlineTracker::refresh`],
//! but only re-verifies the license file when its metadata changed.

use crate::epoch::{InstallEpoch, read_grace_secs};
use crate::paths::LicensePaths;
use crate::record::{max_expiry_for, parse_records};
use crate::verify::SignatureVerifier;
use serde::Serialize;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A computed deadline, in seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deadline {
    /// Install epoch plus grace period.
    pub default: i64,
    /// Latest signed expiry for this install, if any.
    pub licensed: Option<i64>,
}

impl Deadline {
    /// The later of the default and the signed deadline.
    #[must_use]
    pub fn effective(&self) -> i64 {
        self.licensed.map_or(self.default, |l| l.max(self.default))
    }

    /// True once `now` is strictly past the effective deadline.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.effective()
    }

    /// Human-oriented classification of the deadline at `now`.
    #[must_use]
    pub fn status(&self, now: i64) -> LicenseStatus {
        let effective = self.effective();
        if now > effective {
            return LicenseStatus::Expired {
                since: effective,
            };
        }

        let days_remaining = u32::try_from((effective - now) / (24 * 60 * 60)).unwrap_or(u32::MAX);
        match self.licensed {
            Some(l) if l >= self.default => LicenseStatus::Licensed {
                expires_at: effective,
                days_remaining,
            },
            _ => LicenseStatus::Trial {
                expires_at: effective,
                days_remaining,
            },
        }
    }
}

/// Where the install stands relative to its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum LicenseStatus {
    /// Running on the default grace period.
    Trial { expires_at: i64, days_remaining: u32 },
    /// A signed license extends past the grace period.
    Licensed { expires_at: i64, days_remaining: u32 },
    /// Past the deadline.
    Expired { since: i64 },
}

/// Identity and change markers of a file, used to skip re-verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    dev: u64,
    ino: u64,
    size: u64,
    mtime: i64,
    mtime_nsec: i64,
    ctime: i64,
    ctime_nsec: i64,
}

impl FileStamp {
    #[must_use]
    pub fn of(meta: &Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            size: meta.size(),
            mtime: meta.mtime(),
            mtime_nsec: meta.mtime_nsec(),
            ctime: meta.ctime(),
            ctime_nsec: meta.ctime_nsec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LicenseCache {
    stamp: FileStamp,
    identifier: String,
    signed_expiry: Option<i64>,
}

/// Recomputes the effective deadline from the persisted files.
///
/// Owned by a single thread (the watchdog), so it needs no locking.
pub struct DeadlineTracker {
    paths: LicensePaths,
    verifier: Arc<dyn SignatureVerifier>,
    fallback_epoch: i64,
    cache: Option<LicenseCache>,
    epoch: Option<InstallEpoch>,
    last: Option<Deadline>,
}

impl DeadlineTracker {
    /// `fallback_epoch` anchors the default deadline whenever the epoch
    /// file cannot be read.
    pub fn new(
        paths: LicensePaths,
        verifier: Arc<dyn SignatureVerifier>,
        fallback_epoch: i64,
    ) -> Self {
        Self {
            paths,
            verifier,
            fallback_epoch,
            cache: None,
            epoch: None,
            last: None,
        }
    }

    /// The most recently computed deadline.
    pub fn last(&self) -> Option<Deadline> {
        self.last
    }

    /// The most recently read install epoch.
    pub fn epoch(&self) -> Option<&InstallEpoch> {
        self.epoch.as_ref()
    }

    /// Re-reads the epoch, grace override and (if changed) the license file.
    pub fn refresh(&mut self) -> Deadline {
        self.epoch = match InstallEpoch::read(&self.paths.epoch) {
            Ok(e) => Some(e),
            Err(e) => {
                debug!(error = %e, "falling back to watchdog arm time as epoch");
                None
            }
        };

        let anchor = self.epoch.as_ref().map_or(self.fallback_epoch, |e| e.epoch);
        let grace = read_grace_secs(&self.paths.grace);
        let default = anchor.saturating_add(grace);

        let licensed = match self.epoch.as_ref().map(|e| e.identifier.clone()) {
            Some(identifier) => self.signed_expiry(&identifier),
            None => None,
        };

        let deadline = Deadline { default, licensed };
        self.last = Some(deadline);
        deadline
    }

    fn signed_expiry(&mut self, identifier: &str) -> Option<i64> {
        let path = &self.paths.license;
        let meta = match path.symlink_metadata() {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no license file");
                self.cache = None;
                return None;
            }
        };

        let stamp = FileStamp::of(&meta);
        if let Some(cache) = &self.cache
            && cache.stamp == stamp
            && cache.identifier == identifier
        {
            return cache.signed_expiry;
        }

        let signed_expiry = if !meta.file_type().is_file() {
            warn!(path = %path.display(), "license is not a regular file");
            None
        } else if let Err(e) = self.verifier.verify(path) {
            warn!(error = %e, "license signature rejected");
            None
        } else {
            match std::fs::read_to_string(path) {
                Ok(text) => max_expiry_for(&parse_records(&text), identifier),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "license unreadable");
                    None
                }
            }
        };

        debug!(?signed_expiry, "license re-evaluated");
        self.cache = Some(LicenseCache {
            stamp,
            identifier: identifier.to_string(),
            signed_expiry,
        });
        signed_expiry
    }
}
