//! HTTP transports for tail sessions and queries.
//!
//! - [`StreamAdapter`]: server-sent events over a persistent GET.
//! - [`PollAdapter`]: repeated JSON GETs following `next_url`.
//! - [`HttpQueryTransport`]: JSON POSTs to the query endpoint.

mod emit;
pub mod endpoint;
pub mod factory;
pub mod poll;
pub mod query;
pub mod settings;
pub mod sse;
pub mod stream;

pub use endpoint::{rebase_url, TailEndpoint};
pub use factory::{PollAdapterFactory, StreamAdapterFactory};
pub use poll::{classify, HttpPollFetcher, PollAdapter, PollFetcher, PollSettings, PollStep};
pub use query::HttpQueryTransport;
pub use settings::{
    build_factory, default_poll_path, default_query_path, default_stream_path, TransportError,
    TransportSettings,
};
pub use sse::{SseFrame, SseParser};
pub use stream::{frame_to_event, StreamAdapter, RECONNECT_EVENT};
