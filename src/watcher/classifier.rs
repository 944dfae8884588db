//! Classification of raw change records.
//!
//! Each record names a watched directory (by handle) and the entry that
//! changed inside it. The classifier resolves the full path, applies the
//! exclusion filter, and marks the shared [`ChangeSignal`] for anything
//! that survives.

use std::ffi::OsStr;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;

use super::debouncer::ChangeSignal;
use super::filter::ExcludeSet;
use super::installer::{DirectoryWatcher, WatchMap, install_into};

/// One decoded change notification.
#[derive(Debug, Clone, Copy)]
pub struct ChangeRecord<'a, H> {
    pub handle: &'a H,
    /// Entry name inside the watched directory. Records without one are ignored.
    pub name: Option<&'a OsStr>,
    /// The changed entry is itself a directory.
    pub is_dir: bool,
}

/// Turns change records into relevant-change marks.
///
/// Owns the [`WatchMap`]; nothing else reads or writes it.
pub struct EventClassifier<H> {
    watch_map: WatchMap<H>,
    excludes: Arc<ExcludeSet>,
    signal: Arc<ChangeSignal>,
}

impl<H: Eq + Hash + Clone> EventClassifier<H> {
    pub fn new(watch_map: WatchMap<H>, excludes: Arc<ExcludeSet>, signal: Arc<ChangeSignal>) -> Self {
        Self {
            watch_map,
            excludes,
            signal,
        }
    }

    pub fn watch_map(&self) -> &WatchMap<H> {
        &self.watch_map
    }

    /// Classify one record. Returns the changed path if it was relevant.
    ///
    /// Unknown handles are ignored, not treated as errors.
    pub fn classify(&self, record: ChangeRecord<'_, H>) -> Option<PathBuf> {
        let name = record.name.filter(|name| !name.is_empty())?;
        let dir = self.watch_map.get(record.handle)?;
        let path = dir.join(name);

        if self.excludes.is_excluded(&path) {
            crate::debug_event!("watcher", "excluded", "{}", path.display());
            return None;
        }

        crate::debug_event!("watcher", "changed", "{}", path.display());
        self.signal.mark();
        Some(path)
    }

    /// Mark a change without a resolvable path, e.g. after lost events.
    pub fn mark_unresolved(&self) {
        self.signal.mark();
    }

    /// Drop a handle whose directory is no longer watched.
    pub fn forget(&mut self, handle: &H) -> Option<PathBuf> {
        self.watch_map.remove(handle)
    }

    /// Watch a directory created after startup, plus anything already inside it.
    pub fn extend<W>(&mut self, watcher: &mut W, dir: &std::path::Path) -> usize
    where
        W: DirectoryWatcher<Handle = H>,
    {
        install_into(watcher, dir, &self.excludes, &mut self.watch_map)
    }
}
