//! Exported replacements for the intercepted libc entry points.
//!
//! Every hook follows the same shape: resolve the target, ask the guard,
//! then either fail with `EPERM` or forward the untouched arguments.

use crate::fail;
use licwarden_guard::{Resolve, Target};
use std::ffi::{CStr, c_int};

/// Forwards to the next definition of the symbol, or fails with `ENOSYS`.
macro_rules! forward {
    ($real:ident($($arg:expr),* $(,)?)) => {
        match crate::real::$real() {
            // SAFETY: the caller's arguments are passed on unchanged.
            Some(f) => unsafe { f($($arg),*) },
            None => crate::fail(libc::ENOSYS),
        }
    };
}

mod fs;
mod meta;
mod process;

fn denied<T: crate::Failure>() -> T {
    fail(libc::EPERM)
}

/// Resolution mode selected by an `*at` call's flags.
fn resolve_for(flags: c_int) -> Resolve {
    if flags & libc::AT_SYMLINK_NOFOLLOW != 0 {
        Resolve::Entry
    } else {
        Resolve::File
    }
}

/// Target of an `*at` call. An empty path with `AT_EMPTY_PATH` means the
/// descriptor itself.
fn at_target(dirfd: c_int, path: &CStr, flags: c_int) -> Target<'_> {
    if path.is_empty() && flags & libc::AT_EMPTY_PATH != 0 {
        Target::Fd(dirfd)
    } else {
        Target::at(dirfd, path)
    }
}
