use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::RecordBatch;
use crate::cursor::Cursor;
use crate::error::FetchError;

// ════════════════════════════════════════════════════════════════
//  Transport events
// ════════════════════════════════════════════════════════════════

/// Everything an adapter reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established / first request answered.
    Opened,
    /// New records, in log order.
    Batch(RecordBatch),
    /// Not an error: handshake in progress or a request that will be retried.
    Transient(TransientSignal),
    /// The adapter is done; only a fresh `open` brings data back.
    Terminal(TerminalReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientSignal {
    Handshake,
    RequestFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalReason {
    /// Server closed the stream.
    Closed,
    /// Server sent the application-level `reconnect` event.
    ReconnectRequested,
    /// Non-success HTTP status on open.
    Status(u16),
    /// Connect or read failure.
    Network(String),
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalReason::Closed => f.write_str("connection closed"),
            TerminalReason::ReconnectRequested => f.write_str("server requested reconnect"),
            TerminalReason::Status(code) => write!(f, "http status {code}"),
            TerminalReason::Network(msg) => write!(f, "network: {msg}"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Adapter traits
// ════════════════════════════════════════════════════════════════

/// Which tail endpoint an adapter talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Server-sent events, one persistent connection.
    #[default]
    Stream,
    /// Repeated JSON requests following `next_url`.
    Poll,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Stream => f.write_str("stream"),
            TransportKind::Poll => f.write_str("poll"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" | "sse" => Ok(TransportKind::Stream),
            "poll" | "http" => Ok(TransportKind::Poll),
            other => Err(format!("unknown transport '{other}' (expected stream or poll)")),
        }
    }
}

/// Receives adapter events. Called from the adapter's own task.
pub trait TransportListener: Send + Sync {
    fn on_event(&self, event: TransportEvent);
}

/// One connection's worth of tail delivery.
///
/// An adapter is opened at most once. `close` is idempotent, may be called
/// before the spawned work has started, and guarantees no further events.
pub trait TransportAdapter: Send {
    fn kind(&self) -> TransportKind;

    fn open(&mut self, cursor: &Cursor, listener: Arc<dyn TransportListener>);

    fn close(&mut self);
}

/// Builds a fresh adapter for every (re)open.
pub trait AdapterFactory: Send {
    fn build(&mut self) -> Box<dyn TransportAdapter>;
}

impl<F> AdapterFactory for F
where
    F: FnMut() -> Box<dyn TransportAdapter> + Send,
{
    fn build(&mut self) -> Box<dyn TransportAdapter> {
        self()
    }
}

// ════════════════════════════════════════════════════════════════
//  Query transport
// ════════════════════════════════════════════════════════════════

/// Request/response channel to the structured-query endpoint.
pub trait QueryTransport: Send + Sync {
    /// URL of the first page for the configured topic.
    fn endpoint(&self) -> &str;

    /// POST `body` to `url`; returns the raw body of a successful response.
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;

    /// Normalize a server-supplied continuation URL before it is compared or requested.
    fn resolve_continuation(&self, next_url: &str) -> String {
        next_url.to_string()
    }
}
