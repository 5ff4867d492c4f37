//! Mount, namespace escalation, process replacement and event loops.

use super::denied;
use crate::env::{unset_preload, without_preload};
use crate::{c_str, decide};
use libc::{c_char, c_int, c_long, c_uint, c_ulong, c_void, pid_t};
use licwarden_guard::{Escalation, Target, Verdict};

#[unsafe(no_mangle)]
pub unsafe extern "C" fn mount(
    source: *const c_char,
    target: *const c_char,
    fstype: *const c_char,
    flags: c_ulong,
    data: *const c_void,
) -> c_int {
    if let Some(t) = unsafe { c_str(target) }
        && decide("mount", |g| g.check_mount(Target::path(t))).is_denied()
    {
        return denied();
    }
    forward!(mount(source, target, fstype, flags, data))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn pivot_root(new_root: *const c_char, put_old: *const c_char) -> c_int {
    if decide("pivot_root", |g| g.check_escalation(Escalation::PivotRoot)).is_denied() {
        return denied();
    }
    forward!(pivot_root(new_root, put_old))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn chroot(path: *const c_char) -> c_int {
    if decide("chroot", |g| g.check_escalation(Escalation::Chroot)).is_denied() {
        return denied();
    }
    forward!(chroot(path))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ptrace(
    request: c_uint,
    pid: pid_t,
    addr: *mut c_void,
    data: *mut c_void,
) -> c_long {
    if decide("ptrace", |g| g.check_escalation(Escalation::Ptrace)).is_denied() {
        return denied();
    }
    forward!(ptrace(request, pid, addr, data))
}

/// Never refused. The new image starts without the preload variable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execve(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    unset_preload();
    // SAFETY: `envp` is the caller's NULL-terminated environment vector.
    let envp = unsafe { without_preload(envp) };
    forward!(execve(path, argv, envp.as_ptr()))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn epoll_create(size: c_int) -> c_int {
    decide("epoll_create", |g| {
        g.on_event_loop_created();
        Verdict::Allow
    });
    forward!(epoll_create(size))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn epoll_create1(flags: c_int) -> c_int {
    decide("epoll_create1", |g| {
        g.on_event_loop_created();
        Verdict::Allow
    });
    forward!(epoll_create1(flags))
}
