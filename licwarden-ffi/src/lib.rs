//! Preloadable interposition library.
//!
//! Loaded through the dynamic loader's preload mechanism, this library
//! replaces a fixed set of libc entry points. Each replacement asks the
//! [`Guard`] for a verdict: a denial fails the call with `EPERM`, an
//! approval forwards the arguments unchanged to the next definition of
//! the symbol and returns its result verbatim.
//!
//! Calls that arrive before the load-time constructor has built the guard,
//! or that the engine itself issues while deciding, pass straight through.
//!
//! Besides the hooks, the library exports a small host-facing API:
//! `licwarden_declare_licensed`, `licwarden_declare_maintenance`,
//! `licwarden_status`, `licwarden_free_string` and `licwarden_rehash`.

mod env;
#[cfg(not(test))]
mod hooks;
#[cfg(not(test))]
mod real;
mod reentry;

use licwarden_guard::{DEBUG_ENV, Guard, GuardConfig, GuardStatus, LOG_ENV, SignatureConfig, Verdict};
use licwarden_license::InstallEpoch;
use serde::Serialize;
use std::ffi::{CStr, CString, c_char, c_int};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub use reentry::Reentry;

static GUARD: OnceLock<Guard> = OnceLock::new();

/// The process-wide guard, once the constructor has run.
pub fn guard() -> Option<&'static Guard> {
    GUARD.get()
}

/// Builds the guard. Runs once, from the load-time constructor.
pub fn init() {
    let _entered = Reentry::enter();
    init_logging();

    let config = GuardConfig::load();
    match InstallEpoch::create_if_missing(&config.paths.epoch) {
        Ok(true) => debug!("first run, install epoch written"),
        Ok(false) => {}
        Err(e) => debug!(error = %e, "cannot create install epoch"),
    }

    let guard = match Guard::from_config(config.clone()) {
        Ok(g) => g,
        Err(e) => {
            warn!(error = %e, "signature configuration unusable, using gpgv defaults");
            let config = GuardConfig {
                signature: SignatureConfig::default(),
                ..config
            };
            match Guard::from_config(config) {
                Ok(g) => g,
                Err(e) => {
                    warn!(error = %e, "guard unavailable, protection disabled");
                    return;
                }
            }
        }
    };

    if GUARD.set(guard).is_ok() {
        // SAFETY: the handler is a plain function with no captured state.
        let rc = unsafe { libc::pthread_atfork(None, None, Some(after_fork_child)) };
        if rc != 0 {
            warn!(rc, "failed to register fork handler");
        }
    }
}

fn init_logging() {
    if std::env::var_os(DEBUG_ENV).is_none() {
        return;
    }
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "debug".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

unsafe extern "C" fn after_fork_child() {
    if let Some(guard) = guard() {
        let _entered = Reentry::enter();
        guard.after_fork();
    }
}

#[cfg(not(test))]
#[used]
#[unsafe(link_section = ".init_array")]
static CONSTRUCTOR: extern "C" fn() = {
    extern "C" fn licwarden_init() {
        init();
    }
    licwarden_init
};

/// Runs `check` against the guard unless the call must pass through.
/// Denials are logged with the operation name.
pub(crate) fn decide(op: &'static str, check: impl FnOnce(&Guard) -> Verdict) -> Verdict {
    let Some(guard) = guard() else {
        return Verdict::Allow;
    };
    let Some(_entered) = Reentry::enter() else {
        return Verdict::Allow;
    };
    let verdict = check(guard);
    if let Verdict::Deny(reason) = verdict {
        debug!(op, %reason, "denied");
    }
    verdict
}

/// Converts a possibly null C string argument.
///
/// # Safety
/// A non-null `ptr` must point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a CStr> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: non-null and NUL-terminated per the caller's contract.
        Some(unsafe { CStr::from_ptr(ptr) })
    }
}

/// The failure value of a C return type.
pub(crate) trait Failure {
    const FAILED: Self;
}

impl Failure for c_int {
    const FAILED: Self = -1;
}

impl Failure for std::ffi::c_long {
    const FAILED: Self = -1;
}

/// Sets `errno` and returns the failure value.
pub(crate) fn fail<T: Failure>(errno: c_int) -> T {
    // SAFETY: __errno_location returns this thread's errno slot.
    unsafe { *libc::__errno_location() = errno };
    T::FAILED
}

#[derive(Serialize)]
struct StatusDocument {
    initialized: bool,
    #[serde(flatten)]
    status: Option<GuardStatus>,
}

fn status_json() -> String {
    let document = StatusDocument {
        initialized: guard().is_some(),
        status: guard().map(Guard::status),
    };
    serde_json::to_string(&document).unwrap_or_else(|_| r#"{"initialized":false}"#.to_string())
}

/// Declares the calling process self-licensed.
///
/// Returns 1 if this call performed the transition, 0 if the process was
/// already licensed, -1 if the library is not initialized.
#[unsafe(no_mangle)]
pub extern "C" fn licwarden_declare_licensed() -> c_int {
    match guard() {
        Some(g) => {
            let _entered = Reentry::enter();
            c_int::from(g.declare_licensed())
        }
        None => -1,
    }
}

/// Declares the calling process an installer or uninstaller run: exempt
/// from the policies, without arming the deadline watchdog.
///
/// Returns 1 on the transition, 0 if already declared, -1 if the library
/// is not initialized or the configuration disables the declaration.
#[unsafe(no_mangle)]
pub extern "C" fn licwarden_declare_maintenance() -> c_int {
    let Some(g) = guard() else {
        return -1;
    };
    let _entered = Reentry::enter();
    g.declare_maintenance().map_or(-1, c_int::from)
}

/// Returns the engine state as a JSON document.
///
/// The returned pointer must be freed with `licwarden_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn licwarden_status() -> *mut c_char {
    let _entered = Reentry::enter();
    CString::new(status_json()).unwrap_or_default().into_raw()
}

/// Frees a string returned by this library.
///
/// # Safety
/// `ptr` must come from `licwarden_status` and not have been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn licwarden_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: the pointer was produced by CString::into_raw.
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Rebuilds the protected set. Returns the new entry count, or -1 if the
/// library is not initialized.
#[unsafe(no_mangle)]
pub extern "C" fn licwarden_rehash() -> c_int {
    match guard() {
        Some(g) => {
            let _entered = Reentry::enter();
            c_int::try_from(g.rehash()).unwrap_or(c_int::MAX)
        }
        None => -1,
    }
}
