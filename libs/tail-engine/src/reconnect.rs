use std::time::Duration;

use tail_api::Cursor;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::settings::TailSettings;

/// What the user wants the session to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Running,
    Paused,
}

// ═══════════════════════════════════════════════════════════════
//  ReconnectPolicy
// ═══════════════════════════════════════════════════════════════

/// Settle delay, backoff and reopen-cursor rules after a terminal
/// transport event.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    max: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempts: 0,
        }
    }

    pub fn from_settings(settings: &TailSettings) -> Self {
        Self::new(settings.reconnect_delay(), settings.max_reconnect_delay())
    }

    /// Consecutive failures since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next reopen; doubles per consecutive failure up to `max`.
    pub fn next_delay(&mut self) -> Duration {
        let shift = self.attempts.min(16);
        self.attempts = self.attempts.saturating_add(1);
        self.base
            .checked_mul(1u32 << shift)
            .map_or(self.max, |d| d.min(self.max))
    }

    /// Called once the session is connected again.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn should_reopen(&self, desired: Intent) -> bool {
        desired == Intent::Running
    }

    /// Cursor to reopen from: the last applied one, but never earlier than
    /// the cursor the session was opened with.
    pub fn resume_cursor(&self, intent: &Cursor, applied: Option<&Cursor>) -> Cursor {
        match applied {
            Some(applied) if applied.same_stream(intent) && applied.offset() >= intent.offset() => {
                applied.clone()
            }
            _ => intent.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  ReconnectTimer
// ═══════════════════════════════════════════════════════════════

/// One pending reopen. Cancelling (or dropping) it guarantees the
/// callback never runs.
pub struct ReconnectTimer {
    epoch: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReconnectTimer {
    pub fn schedule<F>(epoch: u64, delay: Duration, on_due: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !child.is_cancelled() {
                        on_due();
                    }
                }
            }
        });
        Self {
            epoch,
            token,
            handle,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::trace!(epoch = self.epoch, "reconnect timer cancelled");
            self.token.cancel();
            self.handle.abort();
        }
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
