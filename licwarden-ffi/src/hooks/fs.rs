//! Remove, rename, open and create.

use super::denied;
use crate::{c_str, decide};
use libc::{c_char, c_int, mode_t};
use licwarden_guard::Target;

#[unsafe(no_mangle)]
pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("unlink", |g| g.check_unlink(Target::path(p))).is_denied()
    {
        return denied();
    }
    forward!(unlink(path))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn unlinkat(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("unlinkat", |g| g.check_unlink(Target::at(dirfd, p))).is_denied()
    {
        return denied();
    }
    forward!(unlinkat(dirfd, path, flags))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn remove(path: *const c_char) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("remove", |g| g.check_unlink(Target::path(p))).is_denied()
    {
        return denied();
    }
    forward!(remove(path))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rename(old: *const c_char, new: *const c_char) -> c_int {
    if let (Some(from), Some(to)) = unsafe { (c_str(old), c_str(new)) }
        && decide("rename", |g| {
            g.check_rename(Target::path(from), Target::path(to))
        })
        .is_denied()
    {
        return denied();
    }
    forward!(rename(old, new))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn renameat(
    old_dirfd: c_int,
    old: *const c_char,
    new_dirfd: c_int,
    new: *const c_char,
) -> c_int {
    if let (Some(from), Some(to)) = unsafe { (c_str(old), c_str(new)) }
        && decide("renameat", |g| {
            g.check_rename(Target::at(old_dirfd, from), Target::at(new_dirfd, to))
        })
        .is_denied()
    {
        return denied();
    }
    forward!(renameat(old_dirfd, old, new_dirfd, new))
}

// `mode` is only meaningful with O_CREAT or O_TMPFILE; otherwise whatever
// the caller left in the register is forwarded and ignored by the kernel.

#[unsafe(no_mangle)]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("open", |g| g.check_open(Target::path(p), flags)).is_denied()
    {
        return denied();
    }
    forward!(open(path, flags, mode))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("open64", |g| g.check_open(Target::path(p), flags)).is_denied()
    {
        return denied();
    }
    forward!(open64(path, flags, mode))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn openat(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("openat", |g| g.check_open(Target::at(dirfd, p), flags)).is_denied()
    {
        return denied();
    }
    forward!(openat(dirfd, path, flags, mode))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn openat64(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("openat64", |g| g.check_open(Target::at(dirfd, p), flags)).is_denied()
    {
        return denied();
    }
    forward!(openat64(dirfd, path, flags, mode))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn creat(path: *const c_char, mode: mode_t) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("creat", |g| g.check_creat(Target::path(p))).is_denied()
    {
        return denied();
    }
    forward!(creat(path, mode))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn creat64(path: *const c_char, mode: mode_t) -> c_int {
    if let Some(p) = unsafe { c_str(path) }
        && decide("creat64", |g| g.check_creat(Target::path(p))).is_denied()
    {
        return denied();
    }
    forward!(creat64(path, mode))
}
