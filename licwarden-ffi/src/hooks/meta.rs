//! Truncate, permission, ownership and timestamp changes.
//!
//! Plain variants check the followed file; `l*` variants check the name;
//! `*at` variants follow their `AT_SYMLINK_NOFOLLOW` flag.

use super::{at_target, denied, resolve_for};
use crate::{c_str, decide};
use libc::{c_char, c_int, gid_t, mode_t, off_t, uid_t};
use licwarden_guard::{Resolve, Target};

/// # Safety
/// `path` must be NULL or a NUL-terminated string.
unsafe fn path_denied(op: &'static str, path: *const c_char, resolve: Resolve) -> bool {
    // SAFETY: per the function contract.
    match unsafe { c_str(path) } {
        Some(p) => decide(op, |g| g.check_modify(Target::path(p), resolve)).is_denied(),
        None => false,
    }
}

fn fd_denied(op: &'static str, fd: c_int) -> bool {
    decide(op, |g| g.check_modify(Target::Fd(fd), Resolve::File)).is_denied()
}

/// A NULL path acts on `dirfd` itself.
///
/// # Safety
/// As for [`path_denied`].
unsafe fn at_denied(op: &'static str, dirfd: c_int, path: *const c_char, flags: c_int) -> bool {
    // SAFETY: per the function contract.
    let target = match unsafe { c_str(path) } {
        Some(p) => at_target(dirfd, p, flags),
        None => Target::Fd(dirfd),
    };
    decide(op, |g| g.check_modify(target, resolve_for(flags))).is_denied()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn truncate(path: *const c_char, length: off_t) -> c_int {
    if unsafe { path_denied("truncate", path, Resolve::File) } {
        return denied();
    }
    forward!(truncate(path, length))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn truncate64(path: *const c_char, length: i64) -> c_int {
    if unsafe { path_denied("truncate64", path, Resolve::File) } {
        return denied();
    }
    forward!(truncate64(path, length))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn chmod(path: *const c_char, mode: mode_t) -> c_int {
    if unsafe { path_denied("chmod", path, Resolve::File) } {
        return denied();
    }
    forward!(chmod(path, mode))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fchmod(fd: c_int, mode: mode_t) -> c_int {
    if fd_denied("fchmod", fd) {
        return denied();
    }
    forward!(fchmod(fd, mode))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fchmodat(
    dirfd: c_int,
    path: *const c_char,
    mode: mode_t,
    flags: c_int,
) -> c_int {
    if !path.is_null() && unsafe { at_denied("fchmodat", dirfd, path, flags) } {
        return denied();
    }
    forward!(fchmodat(dirfd, path, mode, flags))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn chown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int {
    if unsafe { path_denied("chown", path, Resolve::File) } {
        return denied();
    }
    forward!(chown(path, owner, group))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lchown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int {
    if unsafe { path_denied("lchown", path, Resolve::Entry) } {
        return denied();
    }
    forward!(lchown(path, owner, group))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fchown(fd: c_int, owner: uid_t, group: gid_t) -> c_int {
    if fd_denied("fchown", fd) {
        return denied();
    }
    forward!(fchown(fd, owner, group))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fchownat(
    dirfd: c_int,
    path: *const c_char,
    owner: uid_t,
    group: gid_t,
    flags: c_int,
) -> c_int {
    if !path.is_null() && unsafe { at_denied("fchownat", dirfd, path, flags) } {
        return denied();
    }
    forward!(fchownat(dirfd, path, owner, group, flags))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn utime(path: *const c_char, times: *const libc::utimbuf) -> c_int {
    if unsafe { path_denied("utime", path, Resolve::File) } {
        return denied();
    }
    forward!(utime(path, times))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn utimes(path: *const c_char, times: *const libc::timeval) -> c_int {
    if unsafe { path_denied("utimes", path, Resolve::File) } {
        return denied();
    }
    forward!(utimes(path, times))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn utimensat(
    dirfd: c_int,
    path: *const c_char,
    times: *const libc::timespec,
    flags: c_int,
) -> c_int {
    if unsafe { at_denied("utimensat", dirfd, path, flags) } {
        return denied();
    }
    forward!(utimensat(dirfd, path, times, flags))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn futimesat(
    dirfd: c_int,
    path: *const c_char,
    times: *const libc::timeval,
) -> c_int {
    if unsafe { at_denied("futimesat", dirfd, path, 0) } {
        return denied();
    }
    forward!(futimesat(dirfd, path, times))
}
