use std::sync::Arc;
use std::time::Duration;

use tail_api::{
    AdapterFactory, ConfigError, Cursor, CursorRequest, RecordBatch, TailRenderer, TerminalReason,
    TransientSignal, TransportAdapter, TransportEvent,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::error::SessionClosed;
use crate::listener::{EpochListener, SessionEvent};
use crate::reconnect::{Intent, ReconnectPolicy, ReconnectTimer};
use crate::settings::TailSettings;
use crate::window::BoundedWindow;

// ═══════════════════════════════════════════════════════════════
//  State & status
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Paused,
    Errored,
}

/// Status line shown next to the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailStatus {
    Idle,
    Connecting,
    Connected,
    Receiving(u64),
    Reconnecting,
    Disconnected,
    ReconnectRequested,
    Retrying,
    Paused,
    NoTopic,
    Invalid(String),
    Stopped,
}

impl std::fmt::Display for TailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TailStatus::Idle => f.write_str("idle"),
            TailStatus::Connecting => f.write_str("connecting..."),
            TailStatus::Connected => f.write_str("connected"),
            TailStatus::Receiving(n) => write!(f, "connected ({n} messages)"),
            TailStatus::Reconnecting => f.write_str("reconnecting..."),
            TailStatus::Disconnected => f.write_str("disconnected - reconnecting..."),
            TailStatus::ReconnectRequested => f.write_str("server requested reconnect"),
            TailStatus::Retrying => f.write_str("retrying..."),
            TailStatus::Paused => f.write_str("paused"),
            TailStatus::NoTopic => f.write_str("no topic specified"),
            TailStatus::Invalid(msg) => write!(f, "invalid request: {msg}"),
            TailStatus::Stopped => f.write_str("stopped"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Commands & handle
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum TailCommand {
    Pause,
    Resume,
    Toggle,
    Snapshot(oneshot::Sender<TailSnapshot>),
    Shutdown,
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailSnapshot {
    pub state: TailState,
    pub status: TailStatus,
    pub messages: u64,
    pub applied: Option<Cursor>,
    pub lines: Vec<String>,
}

/// Returned by [`TailSession::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailSummary {
    /// State the session was in when the loop exited.
    pub state: TailState,
    pub status: TailStatus,
    pub messages: u64,
    pub cursor: Option<Cursor>,
}

/// Cloneable sender side of a session's command channel.
#[derive(Debug, Clone)]
pub struct TailHandle {
    tx: mpsc::Sender<TailCommand>,
}

impl TailHandle {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<TailCommand>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    async fn send(&self, cmd: TailCommand) -> Result<(), SessionClosed> {
        self.tx.send(cmd).await.map_err(|_| SessionClosed)
    }

    pub async fn pause(&self) -> Result<(), SessionClosed> {
        self.send(TailCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), SessionClosed> {
        self.send(TailCommand::Resume).await
    }

    pub async fn toggle(&self) -> Result<(), SessionClosed> {
        self.send(TailCommand::Toggle).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(TailCommand::Shutdown).await
    }

    pub async fn snapshot(&self) -> Result<TailSnapshot, SessionClosed> {
        let (tx, rx) = oneshot::channel();
        self.send(TailCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ═══════════════════════════════════════════════════════════════
//  TailSession
// ═══════════════════════════════════════════════════════════════

struct LiveAdapter {
    epoch: u64,
    adapter: Box<dyn TransportAdapter>,
}

/// One tail: a cursor, at most one live adapter, the window and the
/// reconnect policy.
///
/// The session is an actor. [`TailSession::run`] owns it and multiplexes
/// commands, adapter events, reconnect timers and the render tick in one
/// loop. Adapter events and timer callbacks carry the epoch they were
/// issued for; anything from an older epoch is dropped.
pub struct TailSession {
    request: CursorRequest,
    /// Cursor the session was started with.
    intent: Option<Cursor>,
    /// Last cursor whose data reached the window.
    applied: Option<Cursor>,
    state: TailState,
    desired: Intent,
    epoch: u64,
    adapter: Option<LiveAdapter>,
    factory: Box<dyn AdapterFactory>,
    window: BoundedWindow,
    policy: ReconnectPolicy,
    reconnect: Option<ReconnectTimer>,
    render_interval: Duration,
    renderer: Box<dyn TailRenderer>,
    status: TailStatus,
    messages: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl TailSession {
    pub fn new(
        request: CursorRequest,
        factory: Box<dyn AdapterFactory>,
        renderer: Box<dyn TailRenderer>,
        settings: &TailSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            window: BoundedWindow::new(request.effective_count()),
            request,
            intent: None,
            applied: None,
            state: TailState::Idle,
            desired: Intent::Running,
            epoch: 0,
            adapter: None,
            factory,
            policy: ReconnectPolicy::from_settings(settings),
            reconnect: None,
            render_interval: settings.render_interval(),
            renderer,
            status: TailStatus::Idle,
            messages: 0,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    pub fn status(&self) -> &TailStatus {
        &self.status
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn applied(&self) -> Option<&Cursor> {
        self.applied.as_ref()
    }

    pub fn window(&self) -> &BoundedWindow {
        &self.window
    }

    pub fn snapshot(&self) -> TailSnapshot {
        TailSnapshot {
            state: self.state,
            status: self.status.clone(),
            messages: self.messages,
            applied: self.applied.clone(),
            lines: self.window.to_vec(),
        }
    }

    /// Validate the request and open the first adapter.
    pub fn start(&mut self) {
        if self.state != TailState::Idle {
            return;
        }
        match self.request.resolve() {
            Ok(cursor) => {
                tracing::info!(cursor = %cursor, "tail session starting");
                self.window = BoundedWindow::new(cursor.count());
                self.intent = Some(cursor);
                self.desired = Intent::Running;
                self.open_adapter();
            }
            Err(err) => {
                tracing::error!(error = %err, "tail session cannot start");
                self.state = TailState::Errored;
                self.set_status(match err {
                    ConfigError::NoTopic => TailStatus::NoTopic,
                    other => TailStatus::Invalid(other.to_string()),
                });
            }
        }
    }

    pub fn pause(&mut self) {
        if matches!(self.state, TailState::Errored | TailState::Paused) {
            return;
        }
        tracing::info!(state = ?self.state, "tail session paused");
        self.desired = Intent::Paused;
        self.teardown();
        self.state = TailState::Paused;
        self.set_status(TailStatus::Paused);
    }

    pub fn resume(&mut self) {
        if self.state != TailState::Paused {
            return;
        }
        self.desired = Intent::Running;
        if self.intent.is_none() {
            self.state = TailState::Idle;
            self.start();
        } else {
            tracing::info!("tail session resumed");
            self.open_adapter();
        }
    }

    pub fn toggle(&mut self) {
        if self.state == TailState::Paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Transport { epoch, event } => {
                if self.adapter.as_ref().map(|a| a.epoch) != Some(epoch) {
                    tracing::trace!(epoch, current = self.epoch, "stale transport event dropped");
                    return;
                }
                self.on_transport(event);
            }
            SessionEvent::ReconnectDue { epoch } => {
                if self.reconnect.as_ref().map(ReconnectTimer::epoch) != Some(epoch) {
                    tracing::trace!(epoch, "stale reconnect timer dropped");
                    return;
                }
                self.reconnect = None;
                if self.state == TailState::Reconnecting && self.policy.should_reopen(self.desired) {
                    self.open_adapter();
                }
            }
        }
    }

    /// Flush the window to the renderer if it changed.
    pub fn render_tick(&mut self) {
        if self.window.take_dirty() {
            let received = self.window.received();
            self.renderer.render(self.window.as_slice(), received);
        }
    }

    /// Drive the session until shutdown or until the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<TailCommand>) -> TailSummary {
        self.start();
        if self.state == TailState::Errored {
            return self.summary();
        }
        let Some(mut events) = self.events_rx.take() else {
            return self.summary();
        };

        let mut ticker = tokio::time::interval(self.render_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(TailCommand::Shutdown) | None => break,
                    Some(TailCommand::Pause) => self.pause(),
                    Some(TailCommand::Resume) => self.resume(),
                    Some(TailCommand::Toggle) => self.toggle(),
                    Some(TailCommand::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = ticker.tick() => self.render_tick(),
            }
        }

        let summary = self.summary();
        self.teardown();
        self.render_tick();
        self.set_status(TailStatus::Stopped);
        tracing::info!(messages = summary.messages, state = ?summary.state, "tail session stopped");
        summary
    }

    // ── internals ──

    fn summary(&self) -> TailSummary {
        TailSummary {
            state: self.state,
            status: self.status.clone(),
            messages: self.messages,
            cursor: self.applied.clone().or_else(|| self.intent.clone()),
        }
    }

    fn set_status(&mut self, status: TailStatus) {
        if self.status != status {
            self.renderer.status(&status.to_string());
            self.status = status;
        }
    }

    fn open_adapter(&mut self) {
        let Some(intent) = self.intent.as_ref() else {
            return;
        };
        let cursor = self.policy.resume_cursor(intent, self.applied.as_ref());
        self.teardown();

        self.epoch += 1;
        let epoch = self.epoch;
        let listener = Arc::new(EpochListener::new(epoch, self.events_tx.clone()));
        let mut adapter = self.factory.build();
        tracing::info!(epoch, kind = %adapter.kind(), cursor = %cursor, "opening transport");
        adapter.open(&cursor, listener);

        self.adapter = Some(LiveAdapter { epoch, adapter });
        self.state = TailState::Connecting;
        self.set_status(TailStatus::Connecting);
    }

    /// Close the live adapter and cancel any pending reopen.
    fn teardown(&mut self) {
        if let Some(mut live) = self.adapter.take() {
            tracing::debug!(epoch = live.epoch, "closing transport");
            live.adapter.close();
        }
        if let Some(timer) = self.reconnect.take() {
            timer.cancel();
        }
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.mark_connected(),
            TransportEvent::Batch(batch) => {
                if self.state == TailState::Connecting {
                    self.mark_connected();
                }
                self.apply_batch(batch);
            }
            TransportEvent::Transient(TransientSignal::Handshake) => {
                if self.state == TailState::Connected {
                    self.set_status(TailStatus::Reconnecting);
                } else {
                    self.set_status(TailStatus::Connecting);
                }
            }
            TransportEvent::Transient(TransientSignal::RequestFailed(msg)) => {
                tracing::warn!(error = %msg, "tail request failed, retrying");
                self.set_status(TailStatus::Retrying);
            }
            TransportEvent::Terminal(reason) => self.on_terminal(reason),
        }
    }

    fn mark_connected(&mut self) {
        tracing::debug!(epoch = self.epoch, "transport connected");
        self.state = TailState::Connected;
        self.messages = 0;
        self.policy.reset();
        self.set_status(TailStatus::Connected);
    }

    fn apply_batch(&mut self, batch: RecordBatch) {
        let RecordBatch {
            lines,
            resume_offset,
            ..
        } = batch;
        let received = self.window.extend(lines) as u64;
        self.messages += received;

        if let Some(offset) = resume_offset {
            let base = self.applied.as_ref().or(self.intent.as_ref());
            if let Some(next) = base.and_then(|c| c.advanced_to(offset)) {
                tracing::trace!(cursor = %next, "cursor advanced");
                self.applied = Some(next);
            }
        }
        if received > 0 {
            self.set_status(TailStatus::Receiving(self.messages));
        }
    }

    fn on_terminal(&mut self, reason: TerminalReason) {
        tracing::info!(reason = %reason, state = ?self.state, "transport terminated");
        self.teardown();

        if !self.policy.should_reopen(self.desired) {
            self.state = TailState::Paused;
            self.set_status(TailStatus::Paused);
            return;
        }

        self.state = TailState::Reconnecting;
        self.set_status(match reason {
            TerminalReason::ReconnectRequested => TailStatus::ReconnectRequested,
            _ => TailStatus::Disconnected,
        });

        self.epoch += 1;
        let epoch = self.epoch;
        let delay = self.policy.next_delay();
        let tx = self.events_tx.clone();
        tracing::debug!(epoch, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        self.reconnect = Some(ReconnectTimer::schedule(epoch, delay, move || {
            let _ = tx.send(SessionEvent::ReconnectDue { epoch });
        }));
    }
}

impl Drop for TailSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
