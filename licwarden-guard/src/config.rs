//! Guard configuration.
//!
//! Built from compiled-in defaults, an optional TOML policy file inside the
//! protected license directory, and a small set of environment overrides.
//! A malformed policy file falls back to the defaults with a warning.

use crate::error::{GuardError, GuardResult};
use crate::registry::BuildFailurePolicy;
use crate::watchdog::DEFAULT_INTERVAL;
use licwarden_license::{
    Ed25519Verifier, GPGV_PROGRAM, GpgvVerifier, KEYRING_FILE, LicensePaths, SignatureVerifier,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Policy file location.
pub const CONFIG_FILE: &str = "/lic/licwarden.toml";
/// Enables diagnostic output when set.
pub const DEBUG_ENV: &str = "LICWARDEN_DEBUG";
/// `tracing` filter directive used when diagnostics are enabled.
pub const LOG_ENV: &str = "LICWARDEN_LOG";
/// Overrides the permit file location.
pub const PERMIT_ENV: &str = "LICWARDEN_PERMIT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    pub registry: RegistryConfig,
    pub policy: PolicyConfig,
    pub caller: CallerConfig,
    pub signature: SignatureConfig,
    pub watchdog: WatchdogConfig,
    pub paths: LicensePaths,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub patterns: Vec<String>,
    pub on_build_failure: BuildFailurePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            patterns: [
                "/.epoch",
                "/.default",
                "/lic",
                "/lic/*",
                "/etc/",
                "/etc/ld.so.preload",
                "/lib",
                "/lib/liblicwarden*.so",
                "/lib64/liblicwarden*.so",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            on_build_failure: BuildFailurePolicy::default(),
        }
    }
}

/// How chroot and ptrace are treated. pivot_root is always denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespacePolicy {
    /// chroot and ptrace are denied for every caller.
    #[default]
    Strict,
    /// chroot and ptrace pass through.
    Permissive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub namespace: NamespacePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallerConfig {
    pub marker_symbols: Vec<String>,
    pub trust_marker_symbols: bool,
    pub event_loop_heuristic: bool,
    /// Honor `licwarden_declare_maintenance`.
    pub maintenance_declaration: bool,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            marker_symbols: ["glusterfs_volumes_init", "gf_log_init", "iobuf_get"]
                .into_iter()
                .map(String::from)
                .collect(),
            trust_marker_symbols: true,
            event_loop_heuristic: true,
            maintenance_declaration: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    #[default]
    Gpgv,
    Ed25519,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignatureConfig {
    pub kind: SignatureKind,
    pub program: PathBuf,
    pub keyring: PathBuf,
    /// Hex-encoded Ed25519 public key.
    pub public_key: Option<String>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            kind: SignatureKind::default(),
            program: PathBuf::from(GPGV_PROGRAM),
            keyring: PathBuf::from(KEYRING_FILE),
            public_key: None,
        }
    }
}

impl SignatureConfig {
    /// Builds the configured verifier.
    pub fn verifier(&self) -> GuardResult<Arc<dyn SignatureVerifier>> {
        match self.kind {
            SignatureKind::Gpgv => Ok(Arc::new(GpgvVerifier::new(&self.program, &self.keyring))),
            SignatureKind::Ed25519 => {
                let key = self
                    .public_key
                    .as_deref()
                    .ok_or(licwarden_license::LicenseError::InvalidPublicKey)?;
                Ok(Arc::new(Ed25519Verifier::from_hex(key)?))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    pub interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL.as_secs(),
        }
    }
}

impl WatchdogConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl GuardConfig {
    /// Loads the policy file and applies the process environment.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE)).with_env(|k| std::env::var(k).ok())
    }

    /// Loads from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read policy file {:?}: {}", path, e);
                return Self::default();
            }
        };

        match Self::parse(&text) {
            Ok(config) => {
                info!("Loaded guard policy from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Failed to parse policy file {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> GuardResult<Self> {
        toml::from_str(text).map_err(GuardError::from)
    }

    /// Applies environment overrides obtained through `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(permit) = lookup(PERMIT_ENV).filter(|p| !p.is_empty()) {
            self.paths.permit = PathBuf::from(permit);
        }
        self
    }
}
