/// Realtime event fan-out
///
/// A single in-process broadcast stream carries direct-message events in
/// insertion order. Each WebSocket subscriber filters the stream down to
/// events addressed to or sent by its own user.
use crate::content::messages::DirectMessage;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// An event published when a direct message is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub message: DirectMessage,
}

impl MessageEvent {
    /// Whether this event should be delivered to the given subscriber
    pub fn concerns(&self, user_id: &str) -> bool {
        self.message.sender_id == user_id || self.message.receiver_id == user_id
    }
}

/// Broadcast hub for realtime subscribers
#[derive(Debug, Clone)]
pub struct RealtimeHub {
    sender: broadcast::Sender<MessageEvent>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Events published with no subscribers are dropped,
    /// matching fire-and-forget delivery semantics.
    pub fn publish(&self, event: MessageEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
