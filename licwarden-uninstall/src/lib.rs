//! Removal of an installed licwarden footprint.
//!
//! Every well-known path is removed in a fixed order: files first, then the
//! license directory they live in, then the loader configuration. A path
//! that is already gone is not an error.

use std::ffi::CStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exported by the guard library: exempts the caller without arming the
/// deadline watchdog.
pub const MAINTENANCE_SYMBOL: &CStr = c"licwarden_declare_maintenance";

/// If the guard library is loaded into this process, declares a maintenance
/// run so protected files may be removed even on an expired install.
/// Returns `false` when no guard is loaded or it refused the declaration.
pub fn declare_maintenance() -> bool {
    // SAFETY: the name is NUL-terminated; RTLD_DEFAULT is a valid handle.
    let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, MAINTENANCE_SYMBOL.as_ptr()) };
    if sym.is_null() {
        return false;
    }
    // SAFETY: the exported symbol has this signature.
    let declare: extern "C" fn() -> libc::c_int = unsafe { std::mem::transmute(sym) };
    declare() >= 0
}

/// Installed paths, in removal order.
pub const INSTALLED_PATHS: &[&str] = &[
    "/.epoch",
    "/.default",
    "/lic/gpgv",
    "/lic/pubring.gpg",
    "/lic/license.req",
    "/lic/license.asc",
    "/lic/permit.asc",
    "/lic/licwarden.toml",
    "/lic",
    "/lib/liblicwarden.so",
    "/lib64/liblicwarden.so",
    "/etc/ld.so.preload",
    "/etc/profile.d/licwarden.sh",
];

/// Places an absolute installed path under `root`.
#[must_use]
pub fn under_root(root: &Path, installed: &str) -> PathBuf {
    root.join(installed.trim_start_matches('/'))
}

/// Removes a file, symlink or empty directory. Returns `false` if there
/// was nothing to remove.
pub fn remove_entry(path: &Path) -> io::Result<bool> {
    let meta = match path.symlink_metadata() {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let removed = if meta.is_dir() {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// What happened to each installed path.
#[derive(Debug, Default)]
pub struct Report {
    pub removed: Vec<PathBuf>,
    pub absent: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl Report {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Removes every installed path under `root`, continuing past failures.
pub fn uninstall(root: &Path) -> Report {
    let mut report = Report::default();
    for installed in INSTALLED_PATHS {
        let path = under_root(root, installed);
        match remove_entry(&path) {
            Ok(true) => {
                info!("Removed {}", path.display());
                report.removed.push(path);
            }
            Ok(false) => {
                debug!("Already absent: {}", path.display());
                report.absent.push(path);
            }
            Err(e) => report.failed.push((path, e)),
        }
    }
    report
}
