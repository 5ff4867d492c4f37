//! Shared fixtures for guard tests.

#![allow(dead_code)]

use licwarden_guard::{
    BuildFailurePolicy, CallerProbe, Guard, GuardConfig, NeverLicensed, Terminator, c_path,
};
use licwarden_license::{LicenseError, LicensePaths, LicenseResult, SignatureVerifier};
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

pub const DAY: i64 = 24 * 60 * 60;

/// Accepts every file.
pub struct AcceptingVerifier;

impl SignatureVerifier for AcceptingVerifier {
    fn verify(&self, _path: &Path) -> LicenseResult<()> {
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

/// A probe with a fixed answer.
pub struct FixedProbe(pub bool);

impl CallerProbe for FixedProbe {
    fn probe(&self) -> bool {
        self.0
    }
}

/// Records the termination request instead of killing the test runner.
#[derive(Default)]
pub struct RecordingTerminator {
    pub fired: AtomicBool,
    pub deadline: AtomicI64,
}

impl RecordingTerminator {
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Polls until the terminator fires or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if self.fired() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        self.fired()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, deadline: i64, _now: i64) {
        self.deadline.store(deadline, Ordering::SeqCst);
        self.fired.store(true, Ordering::SeqCst);
    }
}

/// A throwaway install root laid out like a real one:
///
/// ```text
/// <root>/.epoch
/// <root>/lic/license.asc
/// <root>/lic/permit.asc   (written per test)
/// <root>/opt/             (unprotected)
/// ```
pub struct Install {
    pub dir: TempDir,
    pub paths: LicensePaths,
}

impl Install {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("lic")).unwrap();
        std::fs::create_dir_all(dir.path().join("opt")).unwrap();
        let paths = LicensePaths::rooted_at(dir.path());
        std::fs::write(&paths.epoch, "0123456789abcdef0123456789abcdef\n").unwrap();
        std::fs::write(&paths.license, "-----BEGIN PGP SIGNED MESSAGE-----\n").unwrap();
        Self { dir, paths }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Writes an unprotected file.
    pub fn write(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(rel);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// `{"<root>/.epoch", "<root>/lic", "<root>/lic/*"}`.
    pub fn patterns(&self) -> Vec<String> {
        let root = self.root().display();
        vec![
            format!("{root}/.epoch"),
            format!("{root}/lic"),
            format!("{root}/lic/*"),
        ]
    }

    pub fn config(&self) -> GuardConfig {
        let mut config = GuardConfig::default();
        config.registry.patterns = self.patterns();
        config.registry.on_build_failure = BuildFailurePolicy::FailClosed;
        config.paths = self.paths.clone();
        config
    }

    /// An unlicensed guard accepting every signature.
    pub fn guard(&self) -> Guard {
        self.guard_with(self.config(), Arc::new(AcceptingVerifier), Box::new(NeverLicensed))
    }

    pub fn guard_with(
        &self,
        config: GuardConfig,
        verifier: Arc<dyn SignatureVerifier>,
        probe: Box<dyn CallerProbe>,
    ) -> Guard {
        Guard::new(config, verifier, probe, Arc::new(RecordingTerminator::default()))
    }
}

pub fn cpath(path: &Path) -> CString {
    c_path(path).unwrap()
}

/// Sets a file's modification time to `secs` after the Unix epoch.
pub fn set_mtime(path: &Path, secs: i64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs as u64))
        .unwrap();
}
