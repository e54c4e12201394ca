//! Tail and query sessions.
//!
//! [`TailSession`] keeps one transport adapter open against a cursor,
//! feeds a [`BoundedWindow`] and reopens through [`ReconnectPolicy`].
//! [`QuerySession`] runs a structured query with continuation pages and
//! live re-polling. Neither knows about HTTP; adapters and renderers come
//! in through the traits in `tail_api`.

pub mod error;
pub mod listener;
pub mod query;
pub mod reconnect;
pub mod settings;
pub mod tail;
pub mod window;

pub use error::{QueryError, SessionClosed};
pub use listener::{EpochListener, SessionEvent};
pub use query::{QuerySession, QueryStep, QuerySummary, ResultBuffer};
pub use reconnect::{Intent, ReconnectPolicy, ReconnectTimer};
pub use settings::{QuerySettings, TailSettings};
pub use tail::{TailCommand, TailHandle, TailSession, TailSnapshot, TailState, TailStatus, TailSummary};
pub use window::BoundedWindow;
