//! Recursive watch installation.
//!
//! Walks the watched tree depth-first and registers one non-recursive
//! watch per included directory. Excluded directories prune the walk: they
//! are never opened, so nothing beneath them is watched either.

use std::collections::HashMap;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};

use inotify::{EventStream, Inotify, WatchDescriptor, WatchMask, Watches};
use walkdir::WalkDir;

use super::error::WatchError;
use super::filter::ExcludeSet;

/// Events registered on every watched directory.
pub const WATCH_MASK: WatchMask = WatchMask::CREATE
    .union(WatchMask::MODIFY)
    .union(WatchMask::DELETE);

/// Size of the buffer inotify events are decoded from.
const EVENT_BUFFER_SIZE: usize = 32 * 1024;

/// Something that can register a watch on a single directory.
pub trait DirectoryWatcher {
    /// Opaque per-directory handle returned by the notification subsystem.
    type Handle: Eq + Hash + Clone;

    fn add_watch(&mut self, dir: &Path) -> io::Result<Self::Handle>;
}

impl DirectoryWatcher for Watches {
    type Handle = WatchDescriptor;

    fn add_watch(&mut self, dir: &Path) -> io::Result<WatchDescriptor> {
        self.add(dir, WATCH_MASK)
    }
}

/// Mapping from watch handle to the directory it watches.
#[derive(Debug)]
pub struct WatchMap<H> {
    dirs: HashMap<H, PathBuf>,
}

impl<H> Default for WatchMap<H> {
    fn default() -> Self {
        Self {
            dirs: HashMap::new(),
        }
    }
}

impl<H: Eq + Hash> WatchMap<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: H, dir: PathBuf) {
        self.dirs.insert(handle, dir);
    }

    /// Directory for a handle, if it is still known.
    pub fn get(&self, handle: &H) -> Option<&Path> {
        self.dirs.get(handle).map(PathBuf::as_path)
    }

    pub fn remove(&mut self, handle: &H) -> Option<PathBuf> {
        self.dirs.remove(handle)
    }

    pub fn contains_dir(&self, dir: &Path) -> bool {
        self.dirs.values().any(|d| d == dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

/// Linux inotify instance.
pub struct InotifyBackend {
    inotify: Inotify,
}

impl InotifyBackend {
    /// Initialize inotify. Failure here is fatal for the whole process.
    pub fn init() -> Result<Self, WatchError> {
        let inotify = Inotify::init().map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;
        Ok(Self { inotify })
    }

    /// A handle that can keep adding watches after the stream is created.
    pub fn watches(&self) -> Watches {
        self.inotify.watches()
    }

    /// Turn the instance into an async stream of change records.
    pub fn into_event_stream(self) -> Result<EventStream<Vec<u8>>, WatchError> {
        self.inotify
            .into_event_stream(vec![0u8; EVENT_BUFFER_SIZE])
            .map_err(|e| WatchError::InitFailed {
                reason: e.to_string(),
            })
    }
}

impl DirectoryWatcher for InotifyBackend {
    type Handle = WatchDescriptor;

    fn add_watch(&mut self, dir: &Path) -> io::Result<WatchDescriptor> {
        self.watches().add_watch(dir)
    }
}

/// Initialize inotify and watch every included directory under `root`.
pub fn install_watches(
    root: &Path,
    excludes: &ExcludeSet,
) -> Result<(InotifyBackend, WatchMap<WatchDescriptor>), WatchError> {
    let mut backend = InotifyBackend::init()?;
    let mut map = WatchMap::new();
    install_into(&mut backend, root, excludes, &mut map);
    Ok((backend, map))
}

/// Watch `root` and its included descendants, recording each handle in `map`.
///
/// Directories that cannot be watched or listed are logged and skipped;
/// their siblings are still walked. Symbolic links are not followed.
/// Returns the number of watches added.
pub fn install_into<W: DirectoryWatcher>(
    watcher: &mut W,
    root: &Path,
    excludes: &ExcludeSet,
    map: &mut WatchMap<W::Handle>,
) -> usize {
    let mut added = 0;
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_type().is_dir() && !excludes.is_excluded(entry.path()));

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report(&WatchError::from(e));
                continue;
            }
        };

        let dir = entry.path();
        match watcher.add_watch(dir) {
            Ok(handle) => {
                crate::debug_event!("watcher", "watching", "{}", dir.display());
                map.insert(handle, dir.to_path_buf());
                added += 1;
            }
            Err(e) => {
                report(&WatchError::PathWatchFailed {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
                walker.skip_current_dir();
            }
        }
    }

    added
}

/// Log a traversal error. Transient ones only cost a subtree.
fn report(err: &WatchError) {
    if err.is_transient() {
        tracing::warn!("[watcher] {err}");
    } else {
        tracing::error!("[watcher] {err}");
    }
}
