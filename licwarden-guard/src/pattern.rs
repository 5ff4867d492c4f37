//! Glob pattern expansion.
//!
//! Braces (`{a,b}`) are expanded here; wildcards are left to the platform
//! `glob(3)`, which returns each pattern's matches sorted.

use crate::error::{GuardError, GuardResult};
use std::ffi::{CStr, CString, OsStr};
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Expands every top-level brace group, left to right.
///
/// An unbalanced `{` is kept literally. `a{b,c}d{e,f}` yields
/// `abde, abdf, acde, acdf`.
#[must_use]
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = find_brace_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    let mut out = Vec::new();
    for alt in split_alternatives(body) {
        let combined = format!("{prefix}{alt}{suffix}");
        out.extend(expand_braces(&combined));
    }
    out
}

fn find_brace_group(pattern: &str) -> Option<(usize, usize)> {
    let bytes = pattern.as_bytes();
    let open = bytes.iter().position(|&b| b == b'{')?;
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, i));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, b) in body.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// True if the pattern contains no glob metacharacters.
#[must_use]
pub fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['*', '?', '[', '{'])
}

/// Matches of a single brace-free pattern, sorted. No match is not an error.
pub fn glob_paths(pattern: &str) -> GuardResult<Vec<PathBuf>> {
    let c_pattern = CString::new(pattern).map_err(|_| GuardError::Glob {
        pattern: pattern.to_string(),
        reason: "interior NUL byte".to_string(),
    })?;

    // SAFETY: an all-zero glob_t is the documented initial state.
    let mut g: libc::glob_t = unsafe { MaybeUninit::zeroed().assume_init() };
    // SAFETY: `c_pattern` is NUL-terminated and `g` is a valid glob_t.
    let rc = unsafe { libc::glob(c_pattern.as_ptr(), 0, None, &mut g) };

    let result = match rc {
        0 => {
            let mut paths = Vec::with_capacity(g.gl_pathc);
            for i in 0..g.gl_pathc {
                // SAFETY: glob guarantees gl_pathc valid entries in gl_pathv.
                let entry = unsafe { CStr::from_ptr(*g.gl_pathv.add(i)) };
                paths.push(PathBuf::from(OsStr::from_bytes(entry.to_bytes())));
            }
            Ok(paths)
        }
        libc::GLOB_NOMATCH => Ok(Vec::new()),
        libc::GLOB_NOSPACE => Err(GuardError::OutOfMemory("expanding protected patterns")),
        libc::GLOB_ABORTED => Err(GuardError::Glob {
            pattern: pattern.to_string(),
            reason: "read error".to_string(),
        }),
        other => Err(GuardError::Glob {
            pattern: pattern.to_string(),
            reason: format!("glob returned {other}"),
        }),
    };

    // SAFETY: `g` was initialised by glob(3), even on failure.
    unsafe { libc::globfree(&mut g) };
    result
}
