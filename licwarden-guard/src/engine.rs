//! Decision engine.
//!
//! One policy per operation class. A self-licensed caller short-circuits
//! every policy to [`Verdict::Allow`], except the namespace escalations,
//! which do not depend on who is asking.

use crate::caller::{CallerProbe, Classification, LicensedCaller, NeverLicensed, SymbolProbe};
use crate::config::{GuardConfig, NamespacePolicy};
use crate::error::GuardResult;
use crate::fingerprint::{Digest128, fingerprint_at, fingerprint_fd};
use crate::identity::{FileIdentity, Resolve, Target, is_regular};
use crate::permits::PermitStore;
use crate::registry::ProtectedRegistry;
use crate::watchdog::{KillProcess, Terminator, Watchdog, WatchdogReport};
use licwarden_license::{LicenseStatus, SignatureVerifier};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::debug;

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn is_denied(self) -> bool {
        !self.is_allowed()
    }
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("target name is protected")]
    ProtectedEntry,

    #[error("target file is protected")]
    ProtectedFile,

    #[error("source is protected and cannot be relocated")]
    ProtectedSource,

    #[error("destination is protected and no permit authorizes the replacement")]
    NoPermit,

    #[error("write access to a protected file")]
    WriteAccess,

    #[error("mount target is protected")]
    ProtectedMountPoint,

    #[error("{0} is not permitted")]
    Escalation(Escalation),
}

/// Namespace and debugging operations that can escape the protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    PivotRoot,
    Chroot,
    Ptrace,
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PivotRoot => "pivot_root",
            Self::Chroot => "chroot",
            Self::Ptrace => "ptrace",
        })
    }
}

/// Snapshot of the engine state, as exported to the host.
#[derive(Debug, Clone, Serialize)]
pub struct GuardStatus {
    /// `None` while the caller has not been classified yet.
    pub licensed: Option<bool>,
    pub watchdog_armed: bool,
    /// Exempt through a maintenance declaration, watchdog not armed by it.
    pub maintenance: bool,
    pub protected_entries: usize,
    /// Number of loaded permits; `None` before the first load attempt.
    pub permits: Option<usize>,
    pub license: Option<LicenseStatus>,
    pub watchdog: Option<WatchdogReport>,
}

/// The owned protection state every intercepted call consults.
pub struct Guard {
    config: GuardConfig,
    registry: ProtectedRegistry,
    permits: PermitStore,
    caller: LicensedCaller,
    maintenance: AtomicBool,
    watchdog: Watchdog,
}

impl Guard {
    /// Builds the registry immediately; permits load on first use.
    pub fn new(
        config: GuardConfig,
        verifier: Arc<dyn SignatureVerifier>,
        probe: Box<dyn CallerProbe>,
        terminator: Arc<dyn Terminator>,
    ) -> Self {
        let registry = ProtectedRegistry::build(
            config.registry.patterns.clone(),
            config.registry.on_build_failure,
        );
        let permits = PermitStore::new(config.paths.permit.clone(), Arc::clone(&verifier));
        let watchdog = Watchdog::new(
            config.paths.clone(),
            verifier,
            terminator,
            config.watchdog.interval(),
        );

        debug!(protected = registry.len(), "guard initialized");
        Self {
            config,
            registry,
            permits,
            caller: LicensedCaller::new(probe),
            maintenance: AtomicBool::new(false),
            watchdog,
        }
    }

    /// Production wiring: configured verifier, marker-symbol probe (if
    /// trusted) and a process-killing watchdog.
    pub fn from_config(config: GuardConfig) -> GuardResult<Self> {
        let verifier = config.signature.verifier()?;
        let probe: Box<dyn CallerProbe> = if config.caller.trust_marker_symbols {
            Box::new(SymbolProbe::new(&config.caller.marker_symbols))
        } else {
            Box::new(NeverLicensed)
        };
        Ok(Self::new(config, verifier, probe, Arc::new(KillProcess)))
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProtectedRegistry {
        &self.registry
    }

    pub fn permits(&self) -> &PermitStore {
        &self.permits
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Classifies the caller, arming the watchdog on the first positive
    /// classification.
    pub fn caller_is_licensed(&self) -> bool {
        match self.caller.classify() {
            Classification::NewlyLicensed => {
                self.watchdog.arm();
                true
            }
            Classification::Licensed => {
                self.watchdog.ensure_running();
                true
            }
            Classification::Unlicensed => false,
        }
    }

    /// Explicit self-declaration by the host. Returns `true` on the
    /// transition. Always arms the watchdog, also after a maintenance
    /// declaration.
    pub fn declare_licensed(&self) -> bool {
        let transitioned = self.caller.mark_licensed();
        if transitioned {
            debug!("caller declared itself licensed");
        }
        self.watchdog.arm();
        transitioned
    }

    /// Exemption for installer and uninstaller runs.
    ///
    /// Bypasses the same policies as [`Guard::declare_licensed`] but leaves
    /// the watchdog alone, so an expired install can still be removed.
    /// Returns `None` when the configuration disables it, otherwise whether
    /// this call performed the transition.
    pub fn declare_maintenance(&self) -> Option<bool> {
        if !self.config.caller.maintenance_declaration {
            debug!("maintenance declaration refused by configuration");
            return None;
        }
        self.caller.mark_licensed();
        let transitioned = !self.maintenance.swap(true, Ordering::AcqRel);
        if transitioned {
            debug!("caller declared maintenance");
        }
        Some(transitioned)
    }

    /// Event-loop creation side effect.
    pub fn on_event_loop_created(&self) {
        if self.config.caller.event_loop_heuristic {
            self.declare_licensed();
        }
    }

    /// Post-fork hook for the child process.
    pub fn after_fork(&self) {
        self.watchdog.after_fork();
    }

    /// unlink, unlinkat, remove.
    pub fn check_unlink(&self, target: Target<'_>) -> Verdict {
        if self.caller_is_licensed() {
            return Verdict::Allow;
        }
        if self.registry.is_protected(target, Resolve::Entry) {
            return Verdict::Deny(DenyReason::ProtectedEntry);
        }
        Verdict::Allow
    }

    /// rename, renameat.
    ///
    /// A protected source may never move. A protected destination may only
    /// be replaced by content a permit binds to exactly that destination.
    pub fn check_rename(&self, source: Target<'_>, destination: Target<'_>) -> Verdict {
        if self.caller_is_licensed() {
            return Verdict::Allow;
        }
        if self.registry.is_protected(source, Resolve::Entry) {
            return Verdict::Deny(DenyReason::ProtectedSource);
        }

        let Some(dest) = destination.identity(Resolve::Entry) else {
            return Verdict::Allow;
        };
        if !self.registry.contains(dest) {
            return Verdict::Allow;
        }

        if self.permit_authorizes(source, dest) {
            debug!("permit authorizes replacing protected destination");
            Verdict::Allow
        } else {
            Verdict::Deny(DenyReason::NoPermit)
        }
    }

    /// Runs the permit chain. Every failure is a refusal.
    fn permit_authorizes(&self, source: Target<'_>, dest: FileIdentity) -> bool {
        match source.stat(Resolve::Entry) {
            Ok(st) if is_regular(&st) => {}
            Ok(_) => {
                debug!("rename source is not a regular file");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "rename source unresolvable");
                return false;
            }
        }

        let digest = match fingerprint(source) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "cannot fingerprint rename source");
                return false;
            }
        };

        if !self.permits.load() {
            return false;
        }
        let Some(authorized) = self.permits.lookup(&digest) else {
            debug!(%digest, "no permit for source content");
            return false;
        };

        match authorized.symlink_metadata() {
            Ok(meta) => FileIdentity::from_metadata(&meta) == dest,
            Err(e) => {
                debug!(path = %authorized.display(), error = %e, "permit destination unresolvable");
                false
            }
        }
    }

    /// open, openat. Read-only access without create or truncate passes.
    pub fn check_open(&self, target: Target<'_>, flags: libc::c_int) -> Verdict {
        if self.caller_is_licensed() || is_read_only(flags) {
            return Verdict::Allow;
        }
        if self.registry.is_protected(target, Resolve::File) {
            return Verdict::Deny(DenyReason::WriteAccess);
        }
        Verdict::Allow
    }

    /// creat is open with `O_CREAT | O_WRONLY | O_TRUNC`.
    pub fn check_creat(&self, target: Target<'_>) -> Verdict {
        self.check_open(target, libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC)
    }

    /// truncate, chmod, chown and utime families.
    pub fn check_modify(&self, target: Target<'_>, resolve: Resolve) -> Verdict {
        if self.caller_is_licensed() {
            return Verdict::Allow;
        }
        if self.registry.is_protected(target, resolve) {
            return Verdict::Deny(match resolve {
                Resolve::Entry => DenyReason::ProtectedEntry,
                Resolve::File => DenyReason::ProtectedFile,
            });
        }
        Verdict::Allow
    }

    /// mount. Only the mount point is checked.
    pub fn check_mount(&self, target: Target<'_>) -> Verdict {
        if self.caller_is_licensed() {
            return Verdict::Allow;
        }
        if self.registry.is_protected(target, Resolve::File) {
            return Verdict::Deny(DenyReason::ProtectedMountPoint);
        }
        Verdict::Allow
    }

    /// pivot_root is always refused; chroot and ptrace follow the
    /// namespace policy.
    pub fn check_escalation(&self, kind: Escalation) -> Verdict {
        let denied = match kind {
            Escalation::PivotRoot => true,
            Escalation::Chroot | Escalation::Ptrace => {
                self.config.policy.namespace == NamespacePolicy::Strict
            }
        };
        if denied {
            Verdict::Deny(DenyReason::Escalation(kind))
        } else {
            Verdict::Allow
        }
    }

    /// Rebuilds the protected set. Returns the new entry count.
    pub fn rehash(&self) -> usize {
        self.registry.rebuild()
    }

    pub fn status(&self) -> GuardStatus {
        let report = self.watchdog.report();
        let now = chrono::Utc::now().timestamp();
        GuardStatus {
            licensed: self.caller.peek(),
            watchdog_armed: self.watchdog.is_armed(),
            maintenance: self.maintenance.load(Ordering::Acquire),
            protected_entries: self.registry.len(),
            permits: self
                .permits
                .is_attempted()
                .then(|| self.permits.entries().len()),
            license: report.as_ref().map(|r| r.deadline.status(now)),
            watchdog: report,
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("registry", &self.registry)
            .field("permits", &self.permits)
            .field("caller", &self.caller)
            .field("maintenance", &self.maintenance)
            .field("watchdog", &self.watchdog)
            .finish()
    }
}

/// True if `flags` neither write, create nor truncate.
#[must_use]
pub fn is_read_only(flags: libc::c_int) -> bool {
    flags & libc::O_ACCMODE == libc::O_RDONLY && flags & (libc::O_CREAT | libc::O_TRUNC) == 0
}

fn fingerprint(target: Target<'_>) -> std::io::Result<Digest128> {
    match target {
        Target::At { dirfd, path } => fingerprint_at(dirfd, path),
        Target::Fd(fd) => fingerprint_fd(fd),
    }
}
