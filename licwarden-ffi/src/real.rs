//! The interposed-upon implementations, resolved with `dlsym(RTLD_NEXT)`.
//!
//! Each accessor caches its address after the first lookup. A symbol that
//! does not resolve yields `None`, and the hook fails with `ENOSYS`.

use libc::{c_char, c_int, c_long, c_uint, c_ulong, c_void, gid_t, mode_t, off_t, pid_t, uid_t};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

fn resolve(slot: &AtomicPtr<c_void>, name: &'static [u8]) -> *mut c_void {
    let cached = slot.load(Ordering::Acquire);
    if !cached.is_null() {
        return cached;
    }
    // SAFETY: `name` is a NUL-terminated literal; RTLD_NEXT is a valid handle.
    let addr = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr().cast()) };
    if !addr.is_null() {
        slot.store(addr, Ordering::Release);
    }
    addr
}

macro_rules! real {
    ($( $name:ident ( $($arg:ty),* ) -> $ret:ty; )*) => {
        $(
            pub(crate) fn $name() -> Option<unsafe extern "C" fn($($arg),*) -> $ret> {
                static SLOT: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
                let addr = resolve(&SLOT, concat!(stringify!($name), "\0").as_bytes());
                if addr.is_null() {
                    return None;
                }
                // SAFETY: the symbol has this C signature in every libc we load into.
                Some(unsafe {
                    std::mem::transmute::<*mut c_void, unsafe extern "C" fn($($arg),*) -> $ret>(addr)
                })
            }
        )*
    };
}

// `open`, `openat` and `ptrace` are variadic in C. They are declared here
// with their full argument list, which the System V x86-64 and AArch64
// Linux calling conventions pass identically.
real! {
    rename(*const c_char, *const c_char) -> c_int;
    renameat(c_int, *const c_char, c_int, *const c_char) -> c_int;
    unlink(*const c_char) -> c_int;
    unlinkat(c_int, *const c_char, c_int) -> c_int;
    remove(*const c_char) -> c_int;
    open(*const c_char, c_int, mode_t) -> c_int;
    open64(*const c_char, c_int, mode_t) -> c_int;
    openat(c_int, *const c_char, c_int, mode_t) -> c_int;
    openat64(c_int, *const c_char, c_int, mode_t) -> c_int;
    creat(*const c_char, mode_t) -> c_int;
    creat64(*const c_char, mode_t) -> c_int;
    truncate(*const c_char, off_t) -> c_int;
    truncate64(*const c_char, i64) -> c_int;
    chmod(*const c_char, mode_t) -> c_int;
    fchmod(c_int, mode_t) -> c_int;
    fchmodat(c_int, *const c_char, mode_t, c_int) -> c_int;
    chown(*const c_char, uid_t, gid_t) -> c_int;
    lchown(*const c_char, uid_t, gid_t) -> c_int;
    fchown(c_int, uid_t, gid_t) -> c_int;
    fchownat(c_int, *const c_char, uid_t, gid_t, c_int) -> c_int;
    utime(*const c_char, *const libc::utimbuf) -> c_int;
    utimes(*const c_char, *const libc::timeval) -> c_int;
    utimensat(c_int, *const c_char, *const libc::timespec, c_int) -> c_int;
    futimesat(c_int, *const c_char, *const libc::timeval) -> c_int;
    mount(*const c_char, *const c_char, *const c_char, c_ulong, *const c_void) -> c_int;
    pivot_root(*const c_char, *const c_char) -> c_int;
    chroot(*const c_char) -> c_int;
    ptrace(c_uint, pid_t, *mut c_void, *mut c_void) -> c_long;
    execve(*const c_char, *const *const c_char, *const *const c_char) -> c_int;
    epoll_create(c_int) -> c_int;
    epoll_create1(c_int) -> c_int;
}
