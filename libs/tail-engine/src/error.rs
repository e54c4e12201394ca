/// The session loop behind a handle has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session has stopped")]
pub struct SessionClosed;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("cannot encode query body: {0}")]
    Encode(#[from] serde_json::Error),
}
