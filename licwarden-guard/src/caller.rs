//! Self-licensed caller classification.
//!
//! A host process is "self-licensed" when it is the license-aware program
//! the protection exists for; every policy except the unconditional ones is
//! then bypassed. The flag is tri-state (unknown / no / yes) and only ever
//! moves towards yes:
//! - an explicit declaration by the host ([`LicensedCaller::mark_licensed`]),
//! - the event-loop heuristic (also through `mark_licensed`),
//! - a one-time [`CallerProbe`], by default looking for marker symbols.
//!
//! The marker-symbol probe trusts any process that exports a same-named
//! symbol. It is kept for hosts that cannot call the declaration entry
//! point and can be switched off in the configuration.

use std::ffi::CString;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

const UNKNOWN: u8 = 0;
const NO: u8 = 1;
const YES: u8 = 2;

/// Decides, once, whether the host is self-licensed.
pub trait CallerProbe: Send + Sync {
    fn probe(&self) -> bool;
}

/// Looks the marker symbols up in the global symbol scope.
#[derive(Debug, Clone)]
pub struct SymbolProbe {
    symbols: Vec<CString>,
}

impl SymbolProbe {
    /// Symbols containing a NUL byte can never match and are dropped.
    pub fn new<S: AsRef<str>>(symbols: &[S]) -> Self {
        Self {
            symbols: symbols
                .iter()
                .filter_map(|s| CString::new(s.as_ref()).ok())
                .collect(),
        }
    }
}

impl CallerProbe for SymbolProbe {
    fn probe(&self) -> bool {
        self.symbols.iter().any(|symbol| {
            // SAFETY: `symbol` is NUL-terminated; RTLD_DEFAULT is a valid handle.
            let found = !unsafe { libc::dlsym(libc::RTLD_DEFAULT, symbol.as_ptr()) }.is_null();
            if found {
                debug!(symbol = ?symbol, "marker symbol found, caller is licensed");
            }
            found
        })
    }
}

/// A probe that never classifies the host as licensed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverLicensed;

impl CallerProbe for NeverLicensed {
    fn probe(&self) -> bool {
        false
    }
}

/// Result of classifying the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unlicensed,
    Licensed,
    /// Licensed, and this call performed the transition.
    NewlyLicensed,
}

/// The tri-state licensed-caller flag.
pub struct LicensedCaller {
    state: AtomicU8,
    probe: Box<dyn CallerProbe>,
}

impl LicensedCaller {
    pub fn new(probe: Box<dyn CallerProbe>) -> Self {
        Self {
            state: AtomicU8::new(UNKNOWN),
            probe,
        }
    }

    /// Classifies the caller, running the probe the first time only.
    ///
    /// Concurrent first calls may each run the probe; exactly one of them
    /// wins the compare-and-swap and may report `NewlyLicensed`.
    pub fn classify(&self) -> Classification {
        match self.state.load(Ordering::Acquire) {
            YES => return Classification::Licensed,
            NO => return Classification::Unlicensed,
            _ => {}
        }

        let licensed = self.probe.probe();
        let next = if licensed { YES } else { NO };
        match self
            .state
            .compare_exchange(UNKNOWN, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) if licensed => Classification::NewlyLicensed,
            Ok(_) => Classification::Unlicensed,
            Err(YES) => Classification::Licensed,
            Err(_) => Classification::Unlicensed,
        }
    }

    /// Forces the flag to yes. Returns `true` if this call performed the
    /// transition.
    pub fn mark_licensed(&self) -> bool {
        self.state.swap(YES, Ordering::AcqRel) != YES
    }

    /// Current value without probing: `None` while still unknown.
    #[must_use]
    pub fn peek(&self) -> Option<bool> {
        match self.state.load(Ordering::Acquire) {
            YES => Some(true),
            NO => Some(false),
            _ => None,
        }
    }
}

impl std::fmt::Debug for LicensedCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicensedCaller")
            .field("state", &self.peek())
            .finish()
    }
}
