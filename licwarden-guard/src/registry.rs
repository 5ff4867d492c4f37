//! Protected-entity registry.
//!
//! The registry expands a fixed, ordered list of glob patterns into concrete
//! entries and snapshots each entry's `{device, inode}`. Queries resolve the
//! caller's target to an identity and test membership, so a protected object
//! stays protected under any alias or hard link. Bind mounts preserve the
//! identity and need no extra entry.
//!
//! The snapshot sits behind a reader/writer lock: every decision takes a
//! read lock, a rebuild swaps the whole snapshot under the write lock, and
//! readers never observe a partially built set.

use crate::error::GuardResult;
use crate::identity::{FileIdentity, Resolve, Target};
use crate::pattern::{expand_braces, glob_paths, is_literal};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// What to do when pattern expansion fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildFailurePolicy {
    /// Keep the previous snapshot; with none, protect the literal patterns.
    #[default]
    FailClosed,
    /// Discard everything: nothing is protected until the next rebuild.
    FailOpen,
}

/// A protected entry as it was resolved at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedEntry {
    pub path: PathBuf,
    pub identity: FileIdentity,
}

/// An immutable snapshot of protected identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtectedSet {
    entries: Vec<ProtectedEntry>,
}

impl ProtectedSet {
    /// Expands `patterns` in order, appending each pattern's sorted matches.
    ///
    /// Any glob failure fails the whole expansion. Matches that vanish
    /// before they can be `lstat`ed are skipped.
    pub fn expand<S: AsRef<str>>(patterns: &[S]) -> GuardResult<Self> {
        let mut paths = Vec::new();
        for pattern in patterns {
            for expanded in expand_braces(pattern.as_ref()) {
                paths.extend(glob_paths(&expanded)?);
            }
        }
        Ok(Self::from_paths(paths))
    }

    /// Resolves only the wildcard-free patterns, one `lstat` each.
    pub fn literals<S: AsRef<str>>(patterns: &[S]) -> Self {
        let paths = patterns
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| is_literal(p))
            .map(PathBuf::from);
        Self::from_paths(paths)
    }

    fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut entries = Vec::new();
        for path in paths {
            match path.symlink_metadata() {
                Ok(meta) => {
                    let identity = FileIdentity::from_metadata(&meta);
                    debug!(path = %path.display(), dev = identity.dev, ino = identity.ino, "protecting");
                    entries.push(ProtectedEntry { path, identity });
                }
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unresolvable match"),
            }
        }
        Self { entries }
    }

    #[must_use]
    pub fn contains(&self, identity: FileIdentity) -> bool {
        self.entries.iter().any(|e| e.identity == identity)
    }

    #[must_use]
    pub fn entries(&self) -> &[ProtectedEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lock-guarded owner of the current [`ProtectedSet`].
#[derive(Debug)]
pub struct ProtectedRegistry {
    patterns: Vec<String>,
    on_failure: BuildFailurePolicy,
    snapshot: RwLock<ProtectedSet>,
}

impl ProtectedRegistry {
    /// Creates an empty registry; call [`Self::rebuild`] to populate it.
    pub fn new(patterns: Vec<String>, on_failure: BuildFailurePolicy) -> Self {
        Self {
            patterns,
            on_failure,
            snapshot: RwLock::new(ProtectedSet::default()),
        }
    }

    /// Creates and populates a registry.
    pub fn build(patterns: Vec<String>, on_failure: BuildFailurePolicy) -> Self {
        let registry = Self::new(patterns, on_failure);
        registry.rebuild();
        registry
    }

    /// Re-expands the patterns and swaps the snapshot. Returns the number of
    /// protected entries now in effect.
    pub fn rebuild(&self) -> usize {
        let expanded = ProtectedSet::expand(&self.patterns);

        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        match expanded {
            Ok(set) => *snapshot = set,
            Err(e) => match self.on_failure {
                BuildFailurePolicy::FailOpen => {
                    warn!(error = %e, "protected pattern expansion failed, protecting nothing");
                    *snapshot = ProtectedSet::default();
                }
                BuildFailurePolicy::FailClosed if !snapshot.is_empty() => {
                    warn!(error = %e, "protected pattern expansion failed, keeping previous set");
                }
                BuildFailurePolicy::FailClosed => {
                    warn!(error = %e, "protected pattern expansion failed, protecting literals");
                    *snapshot = ProtectedSet::literals(&self.patterns);
                }
            },
        }
        snapshot.len()
    }

    /// Is `identity` one of the protected entities?
    #[must_use]
    pub fn contains(&self, identity: FileIdentity) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity)
    }

    /// Resolves `target` and tests membership. Unresolvable targets are not
    /// protected.
    #[must_use]
    pub fn is_protected(&self, target: Target<'_>, resolve: Resolve) -> bool {
        match target.identity(resolve) {
            Some(identity) => self.contains(identity),
            None => false,
        }
    }

    /// Convenience for a plain path, resolved against the cwd.
    #[must_use]
    pub fn is_protected_path(&self, path: &Path, resolve: Resolve) -> bool {
        let identity = match resolve {
            Resolve::Entry => path.symlink_metadata(),
            Resolve::File => path.metadata(),
        };
        identity
            .map(|m| self.contains(FileIdentity::from_metadata(&m)))
            .unwrap_or(false)
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProtectedSet {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
