//! Fixed on-disk locations of the licensing documents.

use serde::Deserialize;
use std::path::PathBuf;

/// Directory holding the verifier, keyring and signed documents.
pub const LICENSE_DIR: &str = "/lic";
/// Install epoch / random identifier file.
pub const EPOCH_FILE: &str = "/.epoch";
/// Optional grace-period override.
pub const GRACE_FILE: &str = "/.default";
/// Signed permit list.
pub const PERMIT_FILE: &str = "/lic/permit.asc";
/// Signed license records.
pub const LICENSE_FILE: &str = "/lic/license.asc";
/// Verifier binary invoked for signature checks.
pub const GPGV_PROGRAM: &str = "/lic/gpgv";
/// Keyring handed to the verifier.
pub const KEYRING_FILE: &str = "/lic/pubring.gpg";

/// Locations of every persisted file the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LicensePaths {
    pub epoch: PathBuf,
    pub grace: PathBuf,
    pub permit: PathBuf,
    pub license: PathBuf,
}

impl Default for LicensePaths {
    fn default() -> Self {
        Self {
            epoch: PathBuf::from(EPOCH_FILE),
            grace: PathBuf::from(GRACE_FILE),
            permit: PathBuf::from(PERMIT_FILE),
            license: PathBuf::from(LICENSE_FILE),
        }
    }
}

impl LicensePaths {
    /// Places every file under `root`, keeping the default relative layout.
    /// Used by installers working on an alternate root and by tests.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let under = |p: &str| root.join(p.trim_start_matches('/'));
        Self {
            epoch: under(EPOCH_FILE),
            grace: under(GRACE_FILE),
            permit: under(PERMIT_FILE),
            license: under(LICENSE_FILE),
        }
    }
}
