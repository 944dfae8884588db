//! Top-level error type.

use std::path::PathBuf;
use thiserror::Error;

use crate::supervisor::SupervisorError;
use crate::watcher::WatchError;

/// Errors that end a `hotloop` run with a non-zero exit code.
#[derive(Error, Debug)]
pub enum HotloopError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
}

pub type HotloopResult<T> = Result<T, HotloopError>;
