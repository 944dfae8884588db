//! Change detection and debouncing.
//!
//! # Architecture
//!
//! ```text
//! install_watches (once, at startup)
//!   - WalkDir over the root, pruned by ExcludeSet
//!   - one inotify watch per directory -> WatchMap
//!         |
//! inotify EventStream --> EventClassifier --mark--> ChangeSignal
//!                                                       |
//!                              DebounceScheduler <--wait-+
//!                                      |
//!                              RestartTarget (ProcessSupervisor)
//! ```

mod classifier;
mod debouncer;
mod error;
mod filter;
mod installer;

pub use classifier::{ChangeRecord, EventClassifier};
pub use debouncer::{ChangeSignal, DebounceScheduler, QUIET_MS, RestartTarget, Settle};
pub use error::WatchError;
pub use filter::{ExcludeSet, is_excluded};
pub use installer::{
    DirectoryWatcher, InotifyBackend, WATCH_MASK, WatchMap, install_into, install_watches,
};
