use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tail_api::{FetchError, QueryTransport};
use url::Url;

use crate::endpoint::rebase_url;
use crate::settings::TransportError;

/// POSTs query bodies to `<base><path>/<topic>`.
pub struct HttpQueryTransport {
    client: reqwest::Client,
    base: Url,
    endpoint: String,
    timeout: Option<Duration>,
}

impl HttpQueryTransport {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        path: &str,
        topic: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let bad = |detail: String| TransportError::BaseUrl {
            url: base_url.to_string(),
            detail,
        };
        let base = Url::parse(base_url).map_err(|e| bad(e.to_string()))?;
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| bad("not a hierarchical URL".into()))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            segments.push(topic);
        }
        Ok(Self {
            client,
            base,
            endpoint: url.into(),
            timeout,
        })
    }
}

impl QueryTransport for HttpQueryTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(url, body, "query request");
            let mut req = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/json; charset=UTF-8")
                .body(body.to_owned());
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
            resp.text()
                .await
                .map_err(|e| FetchError::Network(format!("read body: {e}")))
        })
    }

    fn resolve_continuation(&self, next_url: &str) -> String {
        rebase_url(&self.base, next_url)
    }
}
