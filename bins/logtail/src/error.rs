#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Request(#[from] tail_api::ConfigError),

    #[error("transport: {0}")]
    Transport(#[from] tail_transport::TransportError),

    #[error("query: {0}")]
    Query(#[from] tail_engine::QueryError),

    #[error("tail: {0}")]
    Tail(String),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
