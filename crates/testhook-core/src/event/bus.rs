//! Broadcast push bus for session-addressed webhook events.
//!
//! Built on `tokio::sync::broadcast`: every connected session subscribes and
//! keeps only the events addressed to it. Delivery is best-effort.

use tokio::sync::broadcast;

use testhook_types::error::PushError;
use testhook_types::event::{PushEvent, SessionEvent};

/// Outbound notification channel to editor sessions.
pub trait PushChannel: Send + Sync {
    /// Deliver `event` to `session_id`.
    fn push(&self, session_id: &str, event: PushEvent) -> Result<(), PushError>;
}

/// Multi-consumer push bus.
///
/// Cloning the bus clones the sender, so producers and the HTTP layer can
/// share one channel.
pub struct PushBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl PushBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events. Callers filter by session id.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl PushChannel for PushBus {
    fn push(&self, session_id: &str, event: PushEvent) -> Result<(), PushError> {
        self.sender
            .send(SessionEvent {
                session_id: session_id.to_string(),
                event,
            })
            .map(|_| ())
            .map_err(|_| PushError::SessionNotConnected(session_id.to_string()))
    }
}

impl Clone for PushBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for PushBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
