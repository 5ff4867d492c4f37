//! Install epoch and default grace period.
//!
//! The epoch file is written exactly once, on first run, with a random
//! identifier. Its modification time anchors the trial period and its
//! content identifies this install inside signed license records. The file
//! is itself a protected entity, so it cannot be reset to restart the trial.

use crate::error::{LicenseError, LicenseResult};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use tracing::{debug, info};

/// Default grace period in seconds (30 days).
pub const DEFAULT_GRACE_SECS: i64 = 30 * 24 * 60 * 60;

/// The anchor of the default deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallEpoch {
    /// Seconds since the Unix epoch at which this install started.
    pub epoch: i64,
    /// Per-install identifier matched against license records.
    pub identifier: String,
}

impl InstallEpoch {
    /// Writes a fresh epoch file unless one already exists.
    ///
    /// Returns `true` if this call created the file. Creation is exclusive,
    /// so two processes racing on first run cannot both write.
    pub fn create_if_missing(path: &Path) -> LicenseResult<bool> {
        if path.symlink_metadata().is_ok() {
            return Ok(false);
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let identifier = uuid::Uuid::new_v4().simple().to_string();
        writeln!(file, "{identifier}")?;
        file.sync_all()?;

        info!(path = %path.display(), "created install epoch");
        Ok(true)
    }

    /// Reads the epoch from its file.
    ///
    /// The epoch is the file's modification time. An empty file falls back
    /// to that timestamp, in decimal, as its identifier.
    pub fn read(path: &Path) -> LicenseResult<Self> {
        let meta = path
            .symlink_metadata()
            .map_err(|e| LicenseError::EpochUnavailable(format!("{}: {e}", path.display())))?;
        if !meta.file_type().is_file() {
            return Err(LicenseError::NotRegularFile(path.to_path_buf()));
        }

        let epoch = meta.mtime();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LicenseError::EpochUnavailable(format!("{}: {e}", path.display())))?;

        let identifier = match content.split_whitespace().next() {
            Some(token) => token.to_string(),
            None => epoch.to_string(),
        };

        Ok(Self { epoch, identifier })
    }
}

/// Reads the grace-period override, falling back to [`DEFAULT_GRACE_SECS`].
///
/// The first whitespace-separated token must be a non-negative decimal
/// number of seconds.
pub fn read_grace_secs(path: &Path) -> i64 {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "grace override unreadable");
            }
            return DEFAULT_GRACE_SECS;
        }
    };

    match content.split_whitespace().next().map(str::parse::<i64>) {
        Some(Ok(secs)) if secs >= 0 => secs,
        _ => {
            debug!(path = %path.display(), "grace override malformed, using default");
            DEFAULT_GRACE_SECS
        }
    }
}
