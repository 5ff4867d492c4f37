//! Tamper-resistance engine for licwarden.
//!
//! Decides, for every intercepted filesystem or process operation, whether
//! it may proceed against a fixed set of protected files:
//! - the protected-entity registry (identity-based, glob-derived),
//! - the signed permit store (content-bound replacement exceptions),
//! - the licensed-caller flag and the deadline watchdog it arms,
//! - the [`Guard`], which owns all of the above and renders [`Verdict`]s.
//!
//! The interception boundary itself lives in `licwarden-ffi`; this crate
//! never touches `errno` and never calls the real operations.

mod caller;
mod config;
mod engine;
mod error;
mod fingerprint;
mod identity;
mod pattern;
mod permits;
mod registry;
mod watchdog;

pub use caller::{CallerProbe, Classification, LicensedCaller, NeverLicensed, SymbolProbe};
pub use config::{
    CONFIG_FILE, CallerConfig, DEBUG_ENV, GuardConfig, LOG_ENV, NamespacePolicy, PERMIT_ENV,
    PolicyConfig, RegistryConfig, SignatureConfig, SignatureKind, WatchdogConfig,
};
pub use engine::{DenyReason, Escalation, Guard, GuardStatus, Verdict, is_read_only};
pub use error::{GuardError, GuardResult};
pub use fingerprint::{Digest128, fingerprint_at, fingerprint_fd};
pub use identity::{FileIdentity, Resolve, Target, c_path, is_regular, stat_at, stat_fd};
pub use pattern::{expand_braces, glob_paths, is_literal};
pub use permits::{PermitEntry, PermitStore, parse_permits, read_permits};
pub use registry::{BuildFailurePolicy, ProtectedEntry, ProtectedRegistry, ProtectedSet};
pub use watchdog::{
    DEFAULT_INTERVAL, KillProcess, Terminator, Tick, Watchdog, WatchdogReport, tick,
};
