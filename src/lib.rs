//! Restart a shell command whenever files under a directory tree change.
//!
//! The pieces, bottom-up:
//! - [`watcher`]: exclusion filter, recursive inotify watch installation,
//!   event classification and the quiet-period debouncer
//! - [`supervisor`]: runs the command in its own process group and
//!   replaces it on request
//! - [`shutdown`]: interrupt handling and the shared shutdown token
//! - [`reloader`]: wires the above together for one run
//!
//! ```no_run
//! use hotloop::{Reloader, ShutdownToken};
//!
//! # async fn demo() -> hotloop::HotloopResult<()> {
//! let shutdown = ShutdownToken::new();
//! hotloop::shutdown::listen_for_interrupt(shutdown.clone())
//!     .map_err(hotloop::HotloopError::Signal)?;
//!
//! Reloader::builder()
//!     .root("src")
//!     .command("cargo run")
//!     .exclude("src/generated")
//!     .build()?
//!     .run(shutdown)
//!     .await
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod reloader;
pub mod shutdown;
pub mod supervisor;
pub mod watcher;

pub use config::Settings;
pub use error::{HotloopError, HotloopResult};
pub use reloader::{Reloader, ReloaderBuilder};
pub use shutdown::ShutdownToken;
pub use supervisor::ProcessSupervisor;
pub use watcher::{ExcludeSet, QUIET_MS};
