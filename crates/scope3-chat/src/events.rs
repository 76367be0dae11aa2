//! Typed side-channel signals emitted to the host UI.

use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered events per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// Notifications the chat core sends besides its state snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The chat overlay should be shown (`true`) or hidden.
    ChatVisibility(bool),
    /// Text of the latest finalized bot reply, for the dashboard panel.
    DashboardUpdate(String),
    /// Tour mode switched on (`true`) or off.
    TourModeChanged(bool),
    /// The walkthrough was completed or skipped.
    TourCompleted,
}

/// Cloneable broadcast handle; publishing never blocks and never fails.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Fire-and-forget; dropped silently when nobody listens.
    pub fn publish(&self, event: ChatEvent) {
        trace!(?event, "publish");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
