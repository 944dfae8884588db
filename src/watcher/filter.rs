//! Exclusion filtering for watched paths.
//!
//! Matching is a raw string-prefix test on the path's byte form, not a
//! path-segment comparison: the prefix `/repo/build` excludes both
//! `/repo/build/out.o` and `/repo/buildx`.

use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Ordered, immutable set of excluded path prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeSet {
    prefixes: Vec<String>,
}

impl ExcludeSet {
    /// Build a set from the prefixes given on the command line.
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `path` starts with any configured prefix.
    pub fn is_excluded(&self, path: &Path) -> bool {
        is_excluded(path, &self.prefixes)
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Pure exclusion predicate over a prefix list.
pub fn is_excluded(path: &Path, prefixes: &[String]) -> bool {
    let bytes = path.as_os_str().as_bytes();
    prefixes
        .iter()
        .any(|prefix| bytes.starts_with(prefix.as_bytes()))
}
