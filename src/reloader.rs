//! Wiring of watcher, debounce timer and supervisor into one run.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use inotify::{Event, EventMask, WatchDescriptor, Watches};

use crate::config::Settings;
use crate::error::{HotloopError, HotloopResult};
use crate::shutdown::ShutdownToken;
use crate::supervisor::ProcessSupervisor;
use crate::watcher::{
    ChangeRecord, ChangeSignal, DebounceScheduler, EventClassifier, ExcludeSet, WatchError,
    install_watches,
};

/// Keeps one command running and restarts it when the watched tree changes.
///
/// Two tasks do the work: the watch loop (this task) waits on the
/// notification stream or shutdown, and the debounce scheduler (spawned)
/// turns quiet periods into restarts. Shutdown stops both, then stops the
/// child gracefully.
pub struct Reloader {
    root: PathBuf,
    command: String,
    excludes: Arc<ExcludeSet>,
    settings: Settings,
}

impl Reloader {
    /// Create a builder for configuring the reloader.
    pub fn builder() -> ReloaderBuilder {
        ReloaderBuilder::new()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run until `shutdown` is triggered or the notification stream fails.
    ///
    /// Returns `Ok(())` only for an orderly, shutdown-driven exit. In every
    /// case where a child was started, it has been stopped and reaped by
    /// the time this returns.
    pub async fn run(self, shutdown: ShutdownToken) -> HotloopResult<()> {
        let (backend, watch_map) = install_watches(&self.root, &self.excludes)?;
        crate::log_event!(
            "watcher",
            "monitoring",
            "{} directories under {}",
            watch_map.len(),
            self.root.display()
        );
        if !self.excludes.is_empty() {
            crate::log_event!("watcher", "excluding", "{}", self.excludes.prefixes().join(", "));
        }
        let mut watches = backend.watches();
        let stream = backend.into_event_stream()?;

        let supervisor = Arc::new(ProcessSupervisor::new(
            self.command.as_str(),
            self.settings.shell.as_str(),
            self.settings.stop_timeout(),
        ));
        supervisor.start().await?;

        let signal = Arc::new(ChangeSignal::new());
        let classifier = EventClassifier::new(watch_map, self.excludes.clone(), signal.clone());
        let scheduler = DebounceScheduler::new(
            signal,
            supervisor.clone(),
            self.settings.quiet(),
            shutdown.clone(),
        );
        let scheduler_task = tokio::spawn(scheduler.run());

        let outcome = watch_loop(
            stream,
            classifier,
            &mut watches,
            self.settings.watch_new_dirs,
            &shutdown,
        )
        .await;

        if let Err(e) = &outcome {
            tracing::error!("[watcher] {e}");
        }

        // A restart already in flight completes before the scheduler
        // returns; graceful_stop then stops whatever it spawned.
        shutdown.trigger();
        if let Err(e) = scheduler_task.await {
            tracing::warn!("[debounce] task failed: {e}");
        }
        supervisor.graceful_stop().await;
        crate::log_event!("shutdown", "complete");

        outcome.map_err(HotloopError::from)
    }
}

/// Multiplexed wait over the notification stream and the shutdown token.
async fn watch_loop<S>(
    stream: S,
    mut classifier: EventClassifier<WatchDescriptor>,
    watches: &mut Watches,
    watch_new_dirs: bool,
    shutdown: &ShutdownToken,
) -> Result<(), WatchError>
where
    S: Stream<Item = io::Result<Event<OsString>>>,
{
    let mut stream = std::pin::pin!(stream);
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => handle_event(&mut classifier, watches, watch_new_dirs, event),
            Some(Err(e)) => {
                return Err(WatchError::EventError {
                    details: e.to_string(),
                });
            }
            None => return Err(WatchError::StreamClosed),
        }
    }
}

fn handle_event(
    classifier: &mut EventClassifier<WatchDescriptor>,
    watches: &mut Watches,
    watch_new_dirs: bool,
    event: Event<OsString>,
) {
    if event.mask.contains(EventMask::Q_OVERFLOW) {
        tracing::warn!("[watcher] event queue overflowed, treating as a change");
        classifier.mark_unresolved();
        return;
    }

    if event.mask.contains(EventMask::IGNORED) {
        if let Some(dir) = classifier.forget(&event.wd) {
            crate::debug_event!("watcher", "watch removed", "{}", dir.display());
        }
        return;
    }

    let is_dir = event.mask.contains(EventMask::ISDIR);
    let record = ChangeRecord {
        handle: &event.wd,
        name: event.name.as_deref(),
        is_dir,
    };
    let Some(path) = classifier.classify(record) else {
        return;
    };

    if watch_new_dirs && is_dir && event.mask.contains(EventMask::CREATE) {
        let added = classifier.extend(watches, &path);
        if added > 0 {
            crate::log_event!("watcher", "watching new", "{} ({added} directories)", path.display());
        }
    }
}

/// Builder for constructing a [`Reloader`].
pub struct ReloaderBuilder {
    root: Option<PathBuf>,
    command: Option<String>,
    excludes: Vec<String>,
    settings: Settings,
}

impl ReloaderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            root: None,
            command: None,
            excludes: Vec::new(),
            settings: Settings::default(),
        }
    }

    /// Set the directory tree to watch.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the shell command to keep running.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Add an excluded path prefix.
    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.excludes.push(prefix.into());
        self
    }

    pub fn excludes(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excludes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the reloader. The root must be an existing directory.
    pub fn build(self) -> HotloopResult<Reloader> {
        let root = self
            .root
            .ok_or(HotloopError::MissingArgument("directory to watch"))?;
        let command = self
            .command
            .ok_or(HotloopError::MissingArgument("command to run"))?;

        if !root.is_dir() {
            return Err(HotloopError::NotADirectory(root));
        }

        Ok(Reloader {
            root,
            command,
            excludes: Arc::new(ExcludeSet::new(self.excludes)),
            settings: self.settings,
        })
    }
}

impl Default for ReloaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
