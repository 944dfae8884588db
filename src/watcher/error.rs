//! Error types for the watch side of the reloader.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watch installation and the notification stream.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The notification subsystem itself is unavailable. Fatal.
    #[error("Failed to initialize inotify: {reason}")]
    InitFailed { reason: String },

    /// A single directory could not be watched. The subtree is skipped.
    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    /// A directory could not be listed during traversal. The subtree is skipped.
    #[error("Cannot list directory {path}: {reason}")]
    ListFailed { path: PathBuf, reason: String },

    #[error("Error reading change notifications: {details}")]
    EventError { details: String },

    #[error("Change notification stream closed unexpectedly")]
    StreamClosed,
}

impl WatchError {
    /// Whether this error only affects a single subtree.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WatchError::PathWatchFailed { .. } | WatchError::ListFailed { .. }
        )
    }
}

impl From<walkdir::Error> for WatchError {
    fn from(e: walkdir::Error) -> Self {
        WatchError::ListFailed {
            path: e.path().map(PathBuf::from).unwrap_or_default(),
            reason: e
                .io_error()
                .map(ToString::to_string)
                .unwrap_or_else(|| e.to_string()),
        }
    }
}
