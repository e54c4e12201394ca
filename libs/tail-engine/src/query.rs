use std::sync::Arc;

use tail_api::{
    FetchError, QueryMode, QueryNotice, QueryRecord, QueryRenderer, QueryRequest, QueryResponse,
    QueryTransport,
};
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::settings::QuerySettings;

// ═══════════════════════════════════════════════════════════════
//  ResultBuffer
// ═══════════════════════════════════════════════════════════════

/// Query rows sorted by timestamp, oldest first, bounded in size.
#[derive(Debug, Clone)]
pub struct ResultBuffer {
    rows: Vec<QueryRecord>,
    capacity: usize,
}

impl ResultBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Merge a page. The sort is stable, so equal timestamps keep arrival order.
    pub fn extend(&mut self, records: Vec<QueryRecord>) {
        self.rows.extend(records);
        self.rows.sort_by_key(QueryRecord::timestamp);
        if self.rows.len() > self.capacity {
            let excess = self.rows.len() - self.capacity;
            self.rows.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn as_slice(&self) -> &[QueryRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  QuerySession
// ═══════════════════════════════════════════════════════════════

/// What the session does after handling one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStep {
    Stop,
    /// Start a new round after the re-poll interval.
    Repoll,
    /// Fetch the next page of this round right away.
    Follow(String),
    /// Re-issue the same request after the re-poll interval.
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySummary {
    pub rounds: u64,
    pub requests: u64,
    pub rows: usize,
    pub cancelled: bool,
}

/// Issues one query, follows continuation pages and re-polls live
/// queries until a terminal record shows up.
pub struct QuerySession {
    request: QueryRequest,
    body: String,
    settings: QuerySettings,
    transport: Arc<dyn QueryTransport>,
    renderer: Box<dyn QueryRenderer>,
    buffer: ResultBuffer,
    /// URL of the request in flight.
    url: String,
    /// Pages received in the current round.
    pages: usize,
    round_terminal: bool,
    rounds: u64,
    requests: u64,
}

impl QuerySession {
    pub fn new(
        request: QueryRequest,
        transport: Arc<dyn QueryTransport>,
        renderer: Box<dyn QueryRenderer>,
        settings: QuerySettings,
    ) -> Result<Self, QueryError> {
        let body = request.to_body()?;
        Ok(Self {
            url: transport.endpoint().to_string(),
            buffer: ResultBuffer::new(settings.max_results),
            request,
            body,
            settings,
            transport,
            renderer,
            pages: 0,
            round_terminal: false,
            rounds: 0,
            requests: 0,
        })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> QueryMode {
        self.request.mode()
    }

    pub fn rows(&self) -> &[QueryRecord] {
        self.buffer.as_slice()
    }

    /// Reset per-round state and point back at the query endpoint.
    pub fn begin_round(&mut self) {
        self.buffer.clear();
        self.url = self.transport.endpoint().to_string();
        self.pages = 0;
        self.round_terminal = false;
        self.rounds += 1;
        tracing::debug!(round = self.rounds, url = %self.url, "query round");
    }

    pub fn apply_response(&mut self, body: &str) -> QueryStep {
        self.requests += 1;
        let continuation = self.pages > 0;
        self.pages += 1;

        match QueryResponse::parse(body, self.mode()) {
            Err(err) => {
                tracing::warn!(error = %err, url = %self.url, "malformed query response");
                self.renderer.notice(&QueryNotice::ProtocolError(err.to_string()));
                self.after_error()
            }
            Ok(QueryResponse::Empty) if continuation => self.end_round(),
            Ok(QueryResponse::Empty) => {
                self.renderer.notice(&QueryNotice::NoResults);
                QueryStep::Stop
            }
            Ok(QueryResponse::ServerError(msg)) => {
                tracing::warn!(error = %msg, "query rejected by server");
                self.renderer.notice(&QueryNotice::ServerError(msg));
                self.after_error()
            }
            Ok(QueryResponse::Keys(keys)) => {
                self.renderer.keys(&keys);
                QueryStep::Stop
            }
            Ok(QueryResponse::Records { records, next_url }) => {
                let terminal = records.iter().any(|r| self.is_terminal(r));
                self.round_terminal |= terminal;
                self.buffer.extend(records);
                self.renderer.rows(self.buffer.as_slice());

                if let Some(next) = next_url {
                    let next = self.transport.resolve_continuation(&next);
                    if next != self.url {
                        self.url = next.clone();
                        return QueryStep::Follow(next);
                    }
                }
                self.end_round()
            }
        }
    }

    pub fn apply_failure(&mut self, err: &FetchError) -> QueryStep {
        self.requests += 1;
        tracing::warn!(error = %err, url = %self.url, "query request failed, retrying");
        QueryStep::Retry
    }

    pub fn is_terminal(&self, record: &QueryRecord) -> bool {
        let kind = record.kind().as_str();
        self.settings.terminal_types.iter().any(|t| t == kind)
    }

    fn end_round(&self) -> QueryStep {
        if self.round_terminal {
            tracing::info!(rows = self.buffer.len(), "terminal record seen, query finished");
            QueryStep::Stop
        } else {
            QueryStep::Repoll
        }
    }

    fn after_error(&self) -> QueryStep {
        match self.mode() {
            QueryMode::Keys => QueryStep::Stop,
            QueryMode::Filter => QueryStep::Repoll,
        }
    }

    /// Run rounds until a stop condition or until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> QuerySummary {
        let transport = self.transport.clone();
        let interval = self.settings.repoll_interval();
        let mut cancelled = false;

        self.begin_round();
        loop {
            let url = self.url.clone();
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                r = transport.post(&url, &self.body) => r,
            };

            let step = match result {
                Ok(body) => self.apply_response(&body),
                Err(err) => self.apply_failure(&err),
            };

            match step {
                QueryStep::Stop => break,
                QueryStep::Follow(next) => {
                    tracing::debug!(url = %next, "following continuation");
                }
                QueryStep::Repoll | QueryStep::Retry => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            cancelled = true;
                            break;
                        }
                        _ = tokio::time::sleep(interval) => {}
                    }
                    if step == QueryStep::Repoll {
                        self.begin_round();
                    }
                }
            }
        }

        QuerySummary {
            rounds: self.rounds,
            requests: self.requests,
            rows: self.buffer.len(),
            cancelled,
        }
    }
}
