use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tail_api::{
    Cursor, RecordBatch, TerminalReason, TransientSignal, TransportAdapter, TransportEvent,
    TransportKind, TransportListener,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::emit::Emitter;
use crate::endpoint::TailEndpoint;
use crate::sse::{SseFrame, SseParser};

/// Named event the server sends before it drops the stream on purpose.
pub const RECONNECT_EVENT: &str = "reconnect";

/// Map a parsed frame onto the session vocabulary. Unknown named
/// events map to `None`.
pub fn frame_to_event(frame: SseFrame) -> Option<TransportEvent> {
    match frame.event.as_deref() {
        Some(RECONNECT_EVENT) => Some(TransportEvent::Terminal(TerminalReason::ReconnectRequested)),
        None | Some("message") => {
            let offset = frame.id.as_deref().and_then(|id| id.trim().parse::<i64>().ok());
            let batch = RecordBatch::new(vec![frame.data]).with_resume_offset(offset);
            Some(TransportEvent::Batch(batch))
        }
        Some(other) => {
            tracing::debug!(event = other, "ignoring server event");
            None
        }
    }
}

/// Persistent `text/event-stream` connection. Every terminal outcome is
/// reported once and ends the task; reopening is the session's call.
pub struct StreamAdapter {
    client: reqwest::Client,
    endpoint: TailEndpoint,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl StreamAdapter {
    pub fn new(client: reqwest::Client, endpoint: TailEndpoint) -> Self {
        Self {
            client,
            endpoint,
            token: CancellationToken::new(),
            handle: None,
        }
    }
}

impl TransportAdapter for StreamAdapter {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn open(&mut self, cursor: &Cursor, listener: Arc<dyn TransportListener>) {
        self.close();
        self.token = CancellationToken::new();
        let url = self.endpoint.url_for(cursor);
        let emitter = Emitter::new(listener, self.token.clone());
        self.handle = Some(tokio::spawn(run_stream(self.client.clone(), url, emitter)));
    }

    fn close(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for StreamAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_stream(client: reqwest::Client, url: String, emitter: Emitter) {
    if !emitter.emit(TransportEvent::Transient(TransientSignal::Handshake)) {
        return;
    }
    tracing::debug!(url = %url, "opening event stream");

    let request = client
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send();
    let resp = tokio::select! {
        _ = emitter.cancelled() => return,
        r = request => r,
    };
    let resp = match resp {
        Ok(resp) => resp,
        Err(e) => {
            emitter.emit(TransportEvent::Terminal(TerminalReason::Network(e.to_string())));
            return;
        }
    };
    let status = resp.status();
    if !status.is_success() {
        emitter.emit(TransportEvent::Terminal(TerminalReason::Status(status.as_u16())));
        return;
    }
    if !emitter.emit(TransportEvent::Opened) {
        return;
    }

    let mut body = resp.bytes_stream();
    let mut parser = SseParser::default();
    loop {
        let chunk = tokio::select! {
            _ = emitter.cancelled() => return,
            c = body.next() => c,
        };
        match chunk {
            Some(Ok(bytes)) => {
                for frame in parser.feed(&bytes) {
                    let Some(event) = frame_to_event(frame) else {
                        continue;
                    };
                    let terminal = matches!(event, TransportEvent::Terminal(_));
                    if !emitter.emit(event) || terminal {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                emitter.emit(TransportEvent::Terminal(TerminalReason::Network(e.to_string())));
                return;
            }
            None => {
                tracing::debug!(url = %url, "event stream ended");
                emitter.emit(TransportEvent::Terminal(TerminalReason::Closed));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: Option<&str>, data: &str, id: Option<&str>) -> SseFrame {
        SseFrame {
            event: event.map(str::to_string),
            data: data.to_string(),
            id: id.map(str::to_string),
        }
    }

    #[test]
    fn maps_frames_to_events() {
        assert_eq!(
            frame_to_event(frame(Some("reconnect"), "", None)),
            Some(TransportEvent::Terminal(TerminalReason::ReconnectRequested))
        );
        assert_eq!(
            frame_to_event(frame(None, "line", Some("17"))),
            Some(TransportEvent::Batch(
                RecordBatch::new(vec!["line".into()]).with_resume_offset(Some(17))
            ))
        );
        assert_eq!(
            frame_to_event(frame(Some("message"), "x", Some("abc"))),
            Some(TransportEvent::Batch(RecordBatch::new(vec!["x".into()])))
        );
        assert_eq!(frame_to_event(frame(Some("ping"), "", None)), None);
    }

    #[tokio::test]
    async fn close_before_task_runs_emits_nothing() {
        struct Panicky;
        impl TransportListener for Panicky {
            fn on_event(&self, event: TransportEvent) {
                panic!("unexpected event {event:?}");
            }
        }

        let endpoint = TailEndpoint::new("http://127.0.0.1:9/", "/s", false).unwrap();
        let mut adapter = StreamAdapter::new(reqwest::Client::new(), endpoint);
        adapter.open(&Cursor::new("logs", 0, 1).unwrap(), Arc::new(Panicky));
        adapter.close();
        adapter.close();
        tokio::task::yield_now().await;
    }
}
