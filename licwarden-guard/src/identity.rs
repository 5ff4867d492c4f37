//! Filesystem identity resolution.
//!
//! Protection is tracked by `{device, inode}`, never by path, so aliases and
//! hard links of a protected object are protected too. A target can be
//! resolved in two ways:
//! - [`Resolve::Entry`] does not follow a trailing symlink (the *name*),
//!   used for rename/unlink targets and `*_NOFOLLOW` variants;
//! - [`Resolve::File`] follows symlinks (the *underlying file*), used for
//!   open/truncate/chmod targets.

use serde::Serialize;
use std::ffi::{CStr, CString};
use std::fs::Metadata;
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{GuardError, GuardResult};

/// Stable identity of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
}

impl FileIdentity {
    #[must_use]
    pub fn from_stat(st: &libc::stat) -> Self {
        Self {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
        }
    }

    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }
}

/// How a trailing symlink is treated during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolve {
    /// Identify the directory entry itself.
    Entry,
    /// Identify whatever the entry ultimately points at.
    File,
}

/// The object an intercepted call acts on.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A path, relative to `dirfd` (or the cwd for `AT_FDCWD`).
    At { dirfd: RawFd, path: &'a CStr },
    /// An already-open descriptor.
    Fd(RawFd),
}

impl<'a> Target<'a> {
    /// A path resolved against the current working directory.
    #[must_use]
    pub fn path(path: &'a CStr) -> Self {
        Self::At {
            dirfd: libc::AT_FDCWD,
            path,
        }
    }

    #[must_use]
    pub fn at(dirfd: RawFd, path: &'a CStr) -> Self {
        Self::At { dirfd, path }
    }

    /// `stat` of the target, following symlinks per `resolve`.
    pub fn stat(&self, resolve: Resolve) -> io::Result<libc::stat> {
        match *self {
            Self::At { dirfd, path } => stat_at(dirfd, path, resolve),
            Self::Fd(fd) => stat_fd(fd),
        }
    }

    /// Identity of the target, or `None` when it cannot be resolved.
    #[must_use]
    pub fn identity(&self, resolve: Resolve) -> Option<FileIdentity> {
        self.stat(resolve).ok().map(|st| FileIdentity::from_stat(&st))
    }
}

/// `fstatat(2)` wrapper.
pub fn stat_at(dirfd: RawFd, path: &CStr, resolve: Resolve) -> io::Result<libc::stat> {
    let flags = match resolve {
        Resolve::Entry => libc::AT_SYMLINK_NOFOLLOW,
        Resolve::File => 0,
    };
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `path` is NUL-terminated and `st` is a valid out-pointer.
    let rc = unsafe { libc::fstatat(dirfd, path.as_ptr(), st.as_mut_ptr(), flags) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstatat succeeded and filled the buffer.
    Ok(unsafe { st.assume_init() })
}

/// `fstat(2)` wrapper.
pub fn stat_fd(fd: RawFd) -> io::Result<libc::stat> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `st` is a valid out-pointer; an invalid fd yields EBADF.
    let rc = unsafe { libc::fstat(fd, st.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstat succeeded and filled the buffer.
    Ok(unsafe { st.assume_init() })
}

/// True if `st` describes a regular file.
#[must_use]
pub fn is_regular(st: &libc::stat) -> bool {
    st.st_mode & libc::S_IFMT == libc::S_IFREG
}

/// Converts a path to the NUL-terminated form the syscalls need.
pub fn c_path(path: &Path) -> GuardResult<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| GuardError::InvalidPath(path.into()))
}
