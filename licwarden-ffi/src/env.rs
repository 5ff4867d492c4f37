//! Preload-variable stripping for `execve`.
//!
//! The replacement image must not inherit the interposition through its
//! environment, so `LD_PRELOAD` is removed both from the calling process
//! and from the vector handed to the new image.

use std::ffi::{CStr, c_char};
use std::ptr;

/// The loader's preload variable.
pub const PRELOAD_VAR: &CStr = c"LD_PRELOAD";

/// True if a `NAME=value` entry sets the preload variable.
#[must_use]
pub fn is_preload_entry(entry: &[u8]) -> bool {
    entry
        .strip_prefix(PRELOAD_VAR.to_bytes())
        .is_some_and(|rest| rest.first() == Some(&b'='))
}

/// Copies a NULL-terminated environment vector without preload entries.
/// The result is NULL-terminated; a NULL `envp` yields an empty vector.
///
/// # Safety
/// `envp` must be NULL or a NULL-terminated array of NUL-terminated
/// strings that stay valid while the result is used.
pub unsafe fn without_preload(envp: *const *const c_char) -> Vec<*const c_char> {
    let mut out = Vec::new();
    if !envp.is_null() {
        let mut cursor = envp;
        loop {
            // SAFETY: the array is NULL-terminated per the caller's contract.
            let entry = unsafe { *cursor };
            if entry.is_null() {
                break;
            }
            // SAFETY: every non-NULL entry is NUL-terminated.
            if !is_preload_entry(unsafe { CStr::from_ptr(entry) }.to_bytes()) {
                out.push(entry);
            }
            // SAFETY: not yet past the terminator.
            cursor = unsafe { cursor.add(1) };
        }
    }
    out.push(ptr::null());
    out
}

/// Removes the preload variable from the calling process's environment.
pub fn unset_preload() {
    // SAFETY: PRELOAD_VAR is NUL-terminated. The host may race other
    // environment accesses; this runs on the way into execve.
    unsafe { libc::unsetenv(PRELOAD_VAR.as_ptr()) };
}
