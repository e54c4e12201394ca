//! Shared types and contracts for tailing and querying an append-only log.
//!
//! No runtime dependency: adapters, sessions and renderers meet here
//! through plain traits and validated data.

pub mod batch;
pub mod cursor;
pub mod error;
pub mod query;
pub mod render;
pub mod transport;

pub use batch::{PollResponse, RecordBatch};
pub use cursor::{Cursor, CursorRequest, DEFAULT_COUNT, SERVER_DEFAULT_OFFSET};
pub use error::{ConfigError, FetchError, ProtocolError};
pub use query::{
    index_field, EventKind, EventValue, QueryClause, QueryMode, QueryOp, QueryRecord,
    QueryRequest, QueryResponse,
};
pub use render::{QueryNotice, QueryRenderer, TailRenderer};
pub use transport::{
    AdapterFactory, QueryTransport, TerminalReason, TransientSignal, TransportAdapter,
    TransportEvent, TransportKind, TransportListener,
};
