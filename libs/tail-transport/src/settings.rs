use std::time::Duration;

use serde::Deserialize;
use tail_api::{AdapterFactory, TransportKind};

use crate::endpoint::TailEndpoint;
use crate::factory::{PollAdapterFactory, StreamAdapterFactory};
use crate::poll::{HttpPollFetcher, PollSettings};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid base URL '{url}': {detail}")]
    BaseUrl { url: String, detail: String },

    #[error("HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How to reach the tail endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    #[serde(default)]
    pub kind: TransportKind,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_poll_path")]
    pub poll_path: String,
    /// Ask the poll endpoint for double-encoded payloads (`/1` suffix).
    #[serde(default)]
    pub double_encode: bool,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per poll request; the stream has no overall deadline.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(flatten)]
    pub poll: PollSettings,
}

pub fn default_stream_path() -> String {
    "/cgi-bin/sse-tail.cgi".into()
}
pub fn default_poll_path() -> String {
    "/cgi-bin/tail.cgi".into()
}
pub fn default_query_path() -> String {
    "/cgi-bin/query.cgi".into()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_request_timeout_ms() -> u64 {
    15000
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            stream_path: default_stream_path(),
            poll_path: default_poll_path(),
            double_encode: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            poll: PollSettings::default(),
        }
    }
}

impl TransportSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `None` when set to zero.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn http_client(&self) -> Result<reqwest::Client, TransportError> {
        Ok(reqwest::Client::builder()
            .connect_timeout(self.connect_timeout())
            .build()?)
    }
}

/// Adapter factory for the configured transport kind.
pub fn build_factory(
    base_url: &str,
    settings: &TransportSettings,
) -> Result<Box<dyn AdapterFactory>, TransportError> {
    let client = settings.http_client()?;
    let factory: Box<dyn AdapterFactory> = match settings.kind {
        TransportKind::Stream => {
            let endpoint = TailEndpoint::new(base_url, &settings.stream_path, false)?;
            Box::new(StreamAdapterFactory::new(client, endpoint))
        }
        TransportKind::Poll => {
            let endpoint = TailEndpoint::new(base_url, &settings.poll_path, settings.double_encode)?;
            let fetcher = HttpPollFetcher::new(client, settings.request_timeout());
            Box::new(PollAdapterFactory::new(fetcher, endpoint, settings.poll.clone()))
        }
    };
    tracing::debug!(kind = %settings.kind, base_url, "transport configured");
    Ok(factory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_layout() {
        let s: TransportSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.kind, TransportKind::Stream);
        assert_eq!(s.stream_path, "/cgi-bin/sse-tail.cgi");
        assert_eq!(s.poll_path, "/cgi-bin/tail.cgi");
        assert_eq!(s.poll.poll_interval_ms, 1000);
        assert_eq!(s.poll.first_poll_delay_ms, 100);
        assert_eq!(s.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn poll_knobs_are_flattened() {
        let s: TransportSettings =
            serde_json::from_str(r#"{"kind":"poll","poll_interval_ms":250,"request_timeout_ms":0}"#)
                .unwrap();
        assert_eq!(s.kind, TransportKind::Poll);
        assert_eq!(s.poll.poll_interval_ms, 250);
        assert_eq!(s.request_timeout(), None);
    }

    #[test]
    fn bad_base_url_is_reported() {
        let err = build_factory("::nope", &TransportSettings::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("::nope"));
    }
}
