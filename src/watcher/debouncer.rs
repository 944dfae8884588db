//! Debounced restart scheduling.
//!
//! A burst of relevant changes collapses into a single restart once the
//! tree has been quiet for the full quiet period. Every change seen while
//! the timer is counting down rearms it, so the timer measures quiescence
//! rather than time since the first change.
//!
//! ```text
//! IDLE --change--> ARMED --quiet period, no change--> restart, IDLE
//!                  ARMED --change during countdown--> ARMED (rearmed)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};

use crate::shutdown::ShutdownToken;

/// Default quiet period in milliseconds.
pub const QUIET_MS: u64 = 1000;

#[derive(Debug, Default, Clone, Copy)]
struct Flags {
    /// A relevant change happened since the last restart.
    pending: bool,
    /// A relevant change happened since the scheduler last checked.
    fresh: bool,
    /// When the most recent relevant change was recorded.
    last_change: Option<Instant>,
}

/// Outcome of the end-of-countdown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// The quiet period elapsed with no change: restart now.
    Fire,
    /// A change arrived during the countdown: wait until this deadline.
    Rearm(Instant),
    /// Nothing is pending.
    Idle,
}

/// Flag pair shared by the classifier and the scheduler.
///
/// Both flags live under one lock so a writer's `pending`/`fresh` update
/// and the scheduler's check-and-clear never interleave. `fresh` is never
/// set while `pending` is clear.
#[derive(Debug, Default)]
pub struct ChangeSignal {
    flags: Mutex<Flags>,
    armed: Notify,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a relevant change and wake an idle scheduler.
    pub fn mark(&self) {
        {
            let mut flags = self.flags.lock();
            flags.pending = true;
            flags.fresh = true;
            flags.last_change = Some(Instant::now());
        }
        self.armed.notify_one();
    }

    pub fn is_pending(&self) -> bool {
        self.flags.lock().pending
    }

    /// Atomically check whether a countdown of `quiet` may fire.
    ///
    /// A change that arrived during the countdown, even at its last
    /// instant, clears `fresh` and rearms relative to that change. Only
    /// when nothing is fresh is `pending` cleared and a restart due.
    pub fn settle(&self, quiet: Duration) -> Settle {
        let mut flags = self.flags.lock();
        if flags.fresh {
            flags.fresh = false;
            let last = flags.last_change.unwrap_or_else(Instant::now);
            Settle::Rearm(last + quiet)
        } else if flags.pending {
            flags.pending = false;
            Settle::Fire
        } else {
            Settle::Idle
        }
    }

    /// Wait until some change is pending.
    async fn wait_pending(&self) {
        // notify_one stores a permit when no one is waiting, so a mark that
        // lands between the check and the await is not lost.
        while !self.is_pending() {
            self.armed.notified().await;
        }
    }

    fn armed_deadline(&self, quiet: Duration) -> Instant {
        let mut flags = self.flags.lock();
        flags.fresh = false;
        flags.last_change.unwrap_or_else(Instant::now) + quiet
    }
}

/// Receiver of debounced restart requests.
#[async_trait]
pub trait RestartTarget: Send + Sync {
    async fn request_restart(&self);
}

/// Single logical timer turning change marks into restart requests.
pub struct DebounceScheduler<T: RestartTarget> {
    signal: Arc<ChangeSignal>,
    target: Arc<T>,
    quiet: Duration,
    shutdown: ShutdownToken,
}

impl<T: RestartTarget> DebounceScheduler<T> {
    pub fn new(
        signal: Arc<ChangeSignal>,
        target: Arc<T>,
        quiet: Duration,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            signal,
            target,
            quiet,
            shutdown,
        }
    }

    /// Run until shutdown. Never restarts once shutdown is observed.
    pub async fn run(self) {
        crate::debug_event!("debounce", "started", "quiet period {:?}", self.quiet);

        'idle: loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.signal.wait_pending() => {}
            }

            // ARMED. The mark that armed us is consumed here; any later one
            // shows up as fresh at the end of the countdown.
            let mut deadline = self.signal.armed_deadline(self.quiet);
            crate::debug_event!("debounce", "armed");

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break 'idle,
                    _ = sleep_until(deadline) => {}
                }

                match self.signal.settle(self.quiet) {
                    Settle::Fire => break,
                    Settle::Rearm(next) => {
                        crate::debug_event!("debounce", "rearmed");
                        deadline = next;
                    }
                    Settle::Idle => continue 'idle,
                }
            }

            if self.shutdown.is_triggered() {
                break;
            }
            self.target.request_restart().await;
        }

        crate::debug_event!("debounce", "stopped");
    }
}
