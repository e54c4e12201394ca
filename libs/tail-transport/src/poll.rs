use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tail_api::{
    Cursor, FetchError, PollResponse, RecordBatch, TransientSignal, TransportAdapter,
    TransportEvent, TransportKind, TransportListener,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::emit::Emitter;
use crate::endpoint::TailEndpoint;

// ═══════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_first_poll_delay_ms")]
    pub first_poll_delay_ms: u64,
    /// Consecutive zero-delay follow-ups before one `drain_pause`.
    #[serde(default = "default_drain_burst_limit")]
    pub drain_burst_limit: usize,
    #[serde(default = "default_drain_pause_ms")]
    pub drain_pause_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_first_poll_delay_ms() -> u64 {
    100
}
fn default_drain_burst_limit() -> usize {
    256
}
fn default_drain_pause_ms() -> u64 {
    10
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            first_poll_delay_ms: default_first_poll_delay_ms(),
            drain_burst_limit: default_drain_burst_limit(),
            drain_pause_ms: default_drain_pause_ms(),
        }
    }
}

impl PollSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn first_poll_delay(&self) -> Duration {
        Duration::from_millis(self.first_poll_delay_ms)
    }

    pub fn drain_pause(&self) -> Duration {
        Duration::from_millis(self.drain_pause_ms)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Fetcher
// ═══════════════════════════════════════════════════════════════

/// One GET of a poll URL. Split out so the scheduling can be driven
/// without a server.
pub trait PollFetcher: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PollResponse, FetchError>> + Send + 'a>>;
}

pub struct HttpPollFetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpPollFetcher {
    pub fn new(client: reqwest::Client, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }
}

impl PollFetcher for HttpPollFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PollResponse, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let mut req = self.client.get(url);
            if let Some(timeout) = self.timeout {
                req = req.timeout(timeout);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let body = resp
                .bytes()
                .await
                .map_err(|e| FetchError::Network(format!("read body: {e}")))?;
            PollResponse::parse(&body).map_err(|e| FetchError::Protocol(e.to_string()))
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Continuation
// ═══════════════════════════════════════════════════════════════

/// Outcome of one successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// No `next_url`: nothing new, payload ignored.
    Idle,
    /// `next_url` equals the request: apply the payload and wait.
    CaughtUp(RecordBatch),
    /// Next page: apply the payload and fetch `next` right away.
    Advance { batch: RecordBatch, next: String },
}

pub fn classify(
    endpoint: &TailEndpoint,
    cursor: &Cursor,
    requested: &str,
    resp: PollResponse,
) -> PollStep {
    let Some(next) = resp.next_url.filter(|n| !n.is_empty()) else {
        return PollStep::Idle;
    };
    let next = endpoint.rebase(&next);
    let offset = endpoint.offset_of(&next, cursor);
    let batch = RecordBatch::from_payload(resp.payload)
        .with_next_url(next.clone())
        .with_resume_offset(offset);

    if next == requested {
        PollStep::CaughtUp(batch)
    } else {
        PollStep::Advance { batch, next }
    }
}

// ═══════════════════════════════════════════════════════════════
//  PollAdapter
// ═══════════════════════════════════════════════════════════════

/// Repeated GETs against the cursor URL, one request at a time.
pub struct PollAdapter<F: PollFetcher> {
    fetcher: Arc<F>,
    endpoint: TailEndpoint,
    settings: PollSettings,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<F: PollFetcher> PollAdapter<F> {
    pub fn new(fetcher: Arc<F>, endpoint: TailEndpoint, settings: PollSettings) -> Self {
        Self {
            fetcher,
            endpoint,
            settings,
            token: CancellationToken::new(),
            handle: None,
        }
    }
}

impl<F: PollFetcher> TransportAdapter for PollAdapter<F> {
    fn kind(&self) -> TransportKind {
        TransportKind::Poll
    }

    fn open(&mut self, cursor: &Cursor, listener: Arc<dyn TransportListener>) {
        self.close();
        self.token = CancellationToken::new();
        let emitter = Emitter::new(listener, self.token.clone());
        self.handle = Some(tokio::spawn(poll_loop(
            self.fetcher.clone(),
            self.endpoint.clone(),
            cursor.clone(),
            self.settings.clone(),
            emitter,
        )));
    }

    fn close(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl<F: PollFetcher> Drop for PollAdapter<F> {
    fn drop(&mut self) {
        self.close();
    }
}

async fn poll_loop<F: PollFetcher>(
    fetcher: Arc<F>,
    endpoint: TailEndpoint,
    cursor: Cursor,
    settings: PollSettings,
    emitter: Emitter,
) {
    let mut url = endpoint.url_for(&cursor);
    let mut delay = settings.first_poll_delay();
    let mut healthy = false;
    let mut burst = 0usize;
    tracing::debug!(url = %url, "poll loop started");

    loop {
        if !delay.is_zero() {
            tokio::select! {
                _ = emitter.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let result = tokio::select! {
            _ = emitter.cancelled() => return,
            r = fetcher.fetch(&url) => r,
        };

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "poll failed");
                healthy = false;
                burst = 0;
                delay = settings.poll_interval();
                let signal = TransientSignal::RequestFailed(err.to_string());
                if !emitter.emit(TransportEvent::Transient(signal)) {
                    return;
                }
                continue;
            }
        };

        if !healthy {
            healthy = true;
            if !emitter.emit(TransportEvent::Opened) {
                return;
            }
        }

        match classify(&endpoint, &cursor, &url, resp) {
            PollStep::Idle => {
                burst = 0;
                delay = settings.poll_interval();
            }
            PollStep::CaughtUp(batch) => {
                burst = 0;
                delay = settings.poll_interval();
                if !batch.is_empty() && !emitter.emit(TransportEvent::Batch(batch)) {
                    return;
                }
            }
            PollStep::Advance { batch, next } => {
                if !emitter.emit(TransportEvent::Batch(batch)) {
                    return;
                }
                url = next;
                burst += 1;
                delay = if burst >= settings.drain_burst_limit.max(1) {
                    burst = 0;
                    tracing::trace!("drain burst limit reached, pausing");
                    settings.drain_pause()
                } else {
                    Duration::ZERO
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TailEndpoint, Cursor) {
        (
            TailEndpoint::new("https://h/", "/t", false).unwrap(),
            Cursor::new("logs", 0, 10).unwrap(),
        )
    }

    fn resp(payload: &[&str], next: Option<&str>) -> PollResponse {
        PollResponse {
            payload: payload.iter().map(|s| s.to_string()).collect(),
            next_url: next.map(str::to_string),
        }
    }

    #[test]
    fn missing_next_url_is_idle() {
        let (ep, c) = setup();
        let url = ep.url_for(&c);
        assert_eq!(classify(&ep, &c, &url, resp(&["x"], None)), PollStep::Idle);
        assert_eq!(classify(&ep, &c, &url, resp(&["x"], Some(""))), PollStep::Idle);
    }

    #[test]
    fn same_url_is_caught_up_after_rebase() {
        let (ep, c) = setup();
        let url = ep.url_for(&c);
        // Server advertises plain http behind TLS.
        match classify(&ep, &c, &url, resp(&["a\n"], Some("http://h/t/logs/0/10"))) {
            PollStep::CaughtUp(batch) => {
                assert_eq!(batch.lines, vec!["a"]);
                assert_eq!(batch.resume_offset, Some(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn different_url_advances() {
        let (ep, c) = setup();
        let url = ep.url_for(&c);
        match classify(&ep, &c, &url, resp(&[], Some("/t/logs/25/10"))) {
            PollStep::Advance { batch, next } => {
                assert_eq!(next, "https://h/t/logs/25/10");
                assert!(batch.is_empty());
                assert_eq!(batch.resume_offset, Some(25));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
