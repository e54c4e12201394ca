/// Rejected cursor or query parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no topic specified")]
    NoTopic,

    #[error("topic '{0}' must not contain '/'")]
    InvalidTopic(String),

    #[error("offset {0} is below -1")]
    InvalidOffset(i64),

    #[error("count must be positive")]
    ZeroCount,

    #[error("unknown query op '{0}'")]
    UnknownOp(String),

    #[error("query needs at least one clause")]
    EmptyQuery,

    #[error("bad clause '{0}': expected FIELD,OP[,KEY]")]
    BadClause(String),
}

/// One failed request against a tail or query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network: {0}")]
    Network(String),

    #[error("http status {0}")]
    Status(u16),

    #[error("protocol: {0}")]
    Protocol(String),
}

/// Response body that could not be turned into a typed response.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected shape: {0}")]
    Shape(String),
}

impl From<ProtocolError> for FetchError {
    fn from(e: ProtocolError) -> Self {
        FetchError::Protocol(e.to_string())
    }
}
