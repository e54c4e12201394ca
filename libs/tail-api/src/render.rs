use crate::query::QueryRecord;

/// Consumer of the tail window. Presentation lives behind this trait.
pub trait TailRenderer: Send {
    /// Full window, most recent line first. `received` counts every line
    /// the session has taken in, including those already evicted, so the
    /// difference between two calls is the number of new lines.
    fn render(&mut self, lines: &[String], received: u64);

    /// Status text changed.
    fn status(&mut self, status: &str);
}

/// Non-row outcome of a query round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNotice {
    NoResults,
    /// Error text sent by the server, shown verbatim.
    ServerError(String),
    /// Response that could not be parsed.
    ProtocolError(String),
}

impl std::fmt::Display for QueryNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryNotice::NoResults => f.write_str("- no results -"),
            QueryNotice::ServerError(msg) => f.write_str(msg),
            QueryNotice::ProtocolError(msg) => write!(f, "bad response: {msg}"),
        }
    }
}

/// Consumer of query results.
pub trait QueryRenderer: Send {
    /// Current result buffer, oldest first.
    fn rows(&mut self, rows: &[QueryRecord]);

    fn keys(&mut self, keys: &[String]);

    fn notice(&mut self, notice: &QueryNotice);
}
