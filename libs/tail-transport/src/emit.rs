use std::sync::Arc;

use tail_api::{TransportEvent, TransportListener};
use tokio_util::sync::CancellationToken;

/// Listener guarded by the adapter's cancellation token.
#[derive(Clone)]
pub(crate) struct Emitter {
    listener: Arc<dyn TransportListener>,
    token: CancellationToken,
}

impl Emitter {
    pub(crate) fn new(listener: Arc<dyn TransportListener>, token: CancellationToken) -> Self {
        Self { listener, token }
    }

    /// Returns `false` once the adapter has been closed; the caller stops.
    pub(crate) fn emit(&self, event: TransportEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.listener.on_event(event);
        true
    }

    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
