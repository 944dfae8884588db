//! Lifecycle of the single supervised child process group.
//!
//! The user's command runs under `sh -c` as the leader of a fresh process
//! group, so it and everything it spawns can be signaled together. A
//! reaper task owns each child and collects its exit status as soon as it
//! exits, whether we killed it or it stopped on its own. Right after the
//! leader is reaped, the reaper kills whatever is left in its group, so a
//! group id is never signaled once it may have been reused.
//!
//! All transitions of "which child is alive" go through one async mutex:
//! a restart kills and reaps the old group before spawning the new one,
//! and a graceful stop waits for any in-flight restart before stopping
//! whatever that restart left running.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};

use super::error::SupervisorError;
use crate::watcher::RestartTarget;

/// How long a killed leader may take to be reaped before we stop waiting.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// A running (or recently exited) child process group.
#[derive(Debug)]
pub struct ChildHandle {
    pgid: i32,
    reaper: JoinHandle<io::Result<ExitStatus>>,
}

impl ChildHandle {
    /// Process group id, equal to the leader's pid.
    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    /// True until the group leader has been reaped.
    pub fn is_live(&self) -> bool {
        self.pgid > 0 && !self.reaper.is_finished()
    }
}

/// Launch `command` through `shell -c` as the leader of a new process group.
///
/// Returns immediately; the exit status is collected in the background.
pub fn spawn_command(shell: &str, command: &str) -> Result<ChildHandle, SupervisorError> {
    let spawn_error = |source| SupervisorError::Spawn {
        command: command.to_string(),
        source,
    };

    let mut child = Command::new(shell)
        .arg("-c")
        .arg(command)
        .process_group(0)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(spawn_error)?;

    let pgid = child
        .id()
        .and_then(|pid| i32::try_from(pid).ok())
        .ok_or_else(|| spawn_error(io::Error::other("child has no pid")))?;

    let reaper = tokio::spawn(async move {
        let status = child.wait().await;
        match &status {
            Ok(status) => crate::log_event!("supervisor", "exited", "pgid {pgid}, {status}"),
            Err(e) => tracing::warn!("[supervisor] wait on pgid {pgid} failed: {e}"),
        }
        // Leftover members keep the group id reserved until they are gone.
        match signal_group(pgid, libc::SIGKILL) {
            Ok(true) => crate::debug_event!("supervisor", "killed leftovers", "pgid {pgid}"),
            Ok(false) => {}
            Err(e) => tracing::warn!("[supervisor] {e}"),
        }
        status
    });

    Ok(ChildHandle { pgid, reaper })
}

/// Send `sig` to every process in group `pgid`.
///
/// Returns `Ok(false)` if the group no longer exists.
fn signal_group(pgid: i32, sig: libc::c_int) -> Result<bool, SupervisorError> {
    if pgid <= 0 {
        return Ok(false);
    }
    // SAFETY: killpg has no memory-safety preconditions.
    let rc = unsafe { libc::killpg(pgid, sig) };
    check_delivery(rc, pgid, sig)
}

/// Send `sig` to the single process `pid`, even if it left its group.
fn signal_process(pid: i32, sig: libc::c_int) -> Result<bool, SupervisorError> {
    if pid <= 0 {
        return Ok(false);
    }
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, sig) };
    check_delivery(rc, pid, sig)
}

fn check_delivery(rc: libc::c_int, pgid: i32, sig: libc::c_int) -> Result<bool, SupervisorError> {
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(SupervisorError::Signal {
            pgid,
            signal: signal_name(sig),
            source: err,
        })
    }
}

fn signal_name(sig: libc::c_int) -> &'static str {
    match sig {
        libc::SIGINT => "SIGINT",
        libc::SIGKILL => "SIGKILL",
        libc::SIGTERM => "SIGTERM",
        _ => "signal",
    }
}

/// Log the outcome of waiting on a reaper. Reap failures are best-effort.
fn report_reap(pgid: i32, joined: Result<io::Result<ExitStatus>, JoinError>) {
    let err = match joined {
        Ok(Ok(status)) => {
            crate::debug_event!("supervisor", "reaped", "pgid {pgid}, {status}");
            return;
        }
        Ok(Err(e)) => SupervisorError::Reap {
            pgid,
            reason: e.to_string(),
        },
        Err(e) => SupervisorError::Reap {
            pgid,
            reason: e.to_string(),
        },
    };
    tracing::warn!("[supervisor] {err}");
}

#[derive(Debug, Default)]
struct Slot {
    child: Option<ChildHandle>,
    /// Set by a graceful stop; no child is spawned afterwards.
    closed: bool,
}

/// Owner of the one child process group running the user's command.
pub struct ProcessSupervisor {
    command: String,
    shell: String,
    stop_timeout: Duration,
    slot: Mutex<Slot>,
}

impl ProcessSupervisor {
    pub fn new(command: impl Into<String>, shell: impl Into<String>, stop_timeout: Duration) -> Self {
        Self {
            command: command.into(),
            shell: shell.into(),
            stop_timeout,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Launch the initial child. A spawn failure here is fatal to the caller.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut slot = self.slot.lock().await;
        if slot.closed {
            return Ok(());
        }
        if let Some(old) = slot.child.take() {
            Self::hard_stop(old).await;
        }
        let handle = spawn_command(&self.shell, &self.command)?;
        crate::log_event!("supervisor", "started", "pgid {}: {}", handle.pgid(), self.command);
        slot.child = Some(handle);
        Ok(())
    }

    /// Kill and reap the current group, then launch a fresh one.
    ///
    /// Returns the new process group id. On spawn failure the supervisor
    /// is left with no child until the next restart. After
    /// [`graceful_stop`](Self::graceful_stop) this is a no-op returning
    /// `None`.
    pub async fn restart(&self) -> Result<Option<i32>, SupervisorError> {
        let mut slot = self.slot.lock().await;
        if slot.closed {
            crate::debug_event!("supervisor", "restart skipped", "shutting down");
            return Ok(None);
        }

        crate::log_event!("supervisor", "reloading");
        if let Some(old) = slot.child.take() {
            Self::hard_stop(old).await;
        }

        let handle = spawn_command(&self.shell, &self.command)?;
        let pgid = handle.pgid();
        crate::log_event!("supervisor", "started", "pgid {pgid}");
        slot.child = Some(handle);
        Ok(Some(pgid))
    }

    /// Interrupt the current group and wait for it to be reaped.
    ///
    /// Escalates to SIGKILL if the leader outlives the stop timeout. Group
    /// members that ignore SIGINT are killed once the leader is reaped.
    /// Closes the supervisor so no later restart spawns anything.
    pub async fn graceful_stop(&self) {
        let mut slot = self.slot.lock().await;
        slot.closed = true;

        let Some(mut handle) = slot.child.take() else {
            crate::debug_event!("supervisor", "no child to stop");
            return;
        };
        let pgid = handle.pgid;

        crate::log_event!("supervisor", "stopping", "pgid {pgid}");
        if let Err(e) = signal_group(pgid, libc::SIGINT) {
            tracing::warn!("[supervisor] {e}");
        }

        match tokio::time::timeout(self.stop_timeout, &mut handle.reaper).await {
            Ok(joined) => report_reap(pgid, joined),
            Err(_) => {
                tracing::warn!(
                    "[supervisor] pgid {pgid} still running after {:?}, killing",
                    self.stop_timeout
                );
                Self::hard_stop(handle).await;
            }
        }
    }

    /// Process group of the live child, if any.
    pub async fn current_pgid(&self) -> Option<i32> {
        let slot = self.slot.lock().await;
        slot.child.as_ref().filter(|h| h.is_live()).map(ChildHandle::pgid)
    }

    pub async fn is_closed(&self) -> bool {
        self.slot.lock().await.closed
    }

    /// SIGKILL the whole group and wait, bounded, for the leader to be reaped.
    ///
    /// A leader that was already reaped is not signaled: its reaper swept
    /// the group and the id may belong to someone else by now.
    async fn hard_stop(handle: ChildHandle) {
        let ChildHandle { pgid, reaper } = handle;
        if !reaper.is_finished() {
            for sent in [
                signal_group(pgid, libc::SIGKILL),
                signal_process(pgid, libc::SIGKILL),
            ] {
                if let Err(e) = sent {
                    tracing::warn!("[supervisor] {e}");
                }
            }
        }

        match tokio::time::timeout(REAP_TIMEOUT, reaper).await {
            Ok(joined) => report_reap(pgid, joined),
            Err(_) => {
                let err = SupervisorError::Reap {
                    pgid,
                    reason: format!("leader not reaped within {REAP_TIMEOUT:?}"),
                };
                tracing::warn!("[supervisor] {err}");
            }
        }
    }
}

#[async_trait]
impl RestartTarget for ProcessSupervisor {
    async fn request_restart(&self) {
        if let Err(e) = self.restart().await {
            tracing::error!("[supervisor] {e}; waiting for the next change");
        }
    }
}
