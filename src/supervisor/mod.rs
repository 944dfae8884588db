//! Child process supervision.

mod error;
mod process;

pub use error::SupervisorError;
pub use process::{ChildHandle, ProcessSupervisor, spawn_command};
