use tail_api::{TransportEvent, TransportListener};
use tokio::sync::mpsc;

/// Input of the session loop, tagged with the epoch it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Transport { epoch: u64, event: TransportEvent },
    ReconnectDue { epoch: u64 },
}

/// Listener handed to one adapter instance. Forwards into the session
/// loop; a closed loop is not an error for the adapter.
pub struct EpochListener {
    epoch: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EpochListener {
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { epoch, tx }
    }
}

impl TransportListener for EpochListener {
    fn on_event(&self, event: TransportEvent) {
        if self
            .tx
            .send(SessionEvent::Transport {
                epoch: self.epoch,
                event,
            })
            .is_err()
        {
            tracing::trace!(epoch = self.epoch, "session gone, event dropped");
        }
    }
}
