//! In-process progress bus backed by a `tokio::sync::broadcast` channel.
//!
//! Sessions publish a [`ProgressEvent`] after each successful step
//! transition and never wait for delivery. Shared via `Arc<EventBus>`.

use onboard_core::submission::CrmPayload;
use tokio::sync::broadcast;

/// A progress ping waiting to be forwarded to the CRM.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub session_key: String,
    pub payload: CrmPayload,
}

impl ProgressEvent {
    pub fn new(session_key: impl Into<String>, payload: CrmPayload) -> Self {
        Self {
            session_key: session_key.into(),
            payload,
        }
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out bus.
///
/// When the buffer is full the oldest unconsumed pings are dropped and slow
/// receivers observe `RecvError::Lagged`. Pings are advisory, so that loss
/// is acceptable.
pub struct EventBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when there are
    /// none.
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
