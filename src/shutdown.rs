//! Shutdown coordination.
//!
//! The signal listener does the minimum: it trips the [`ShutdownToken`].
//! Every blocking wait in the reloader selects on the token, so tripping
//! it unblocks the watch loop and the debounce timer. The actual teardown
//! (stopping the child) runs afterwards in the normal task that owns it.

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Process-wide stop flag plus wakeup channel. Set once, never reset.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    token: CancellationToken,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Trip `token` on the first SIGINT or SIGTERM.
///
/// Returns an error only if the signal handlers cannot be installed.
pub fn listen_for_interrupt(token: ShutdownToken) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = token.cancelled() => return,
        };
        crate::log_event!("shutdown", "received", "{name}");
        token.trigger();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_all_waiters() {
        let token = ShutdownToken::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let token = token.clone();
                tokio::spawn(async move { token.cancelled().await })
            })
            .collect();

        assert!(!token.is_triggered());
        token.trigger();
        token.trigger();
        assert!(token.is_triggered());

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter not woken")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_listener_exits_when_token_tripped_elsewhere() {
        let token = ShutdownToken::new();
        let listener = listen_for_interrupt(token.clone()).unwrap();
        token.trigger();
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .expect("listener still running")
            .unwrap();
    }
}
