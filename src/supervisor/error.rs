//! Error types for child process supervision.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send {signal} to process group {pgid}: {source}")]
    Signal {
        pgid: i32,
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to reap process group {pgid}: {reason}")]
    Reap { pgid: i32, reason: String },
}
