// Event streaming for Dashboard
//
// Uses tokio broadcast channel to stream state changes to multiple SSE clients

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event sent to Dashboard clients
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardEvent {
    /// Timestamp (ISO 8601)
    pub timestamp: String,
    /// Event type
    pub event_type: DashboardEventType,
    /// Inbound message name that caused the change
    pub source: Option<String>,
    pub lane: Option<String>,
    pub tag_id: Option<String>,
    /// Short human-readable summary
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardEventType {
    /// New tag in the valid list
    ValidTag,
    /// New tag in the invalid list
    InvalidTag,
    /// Lane status applied
    LaneStatus,
    /// Current shipment advanced
    ShipmentProgress,
    /// Upstream link went up or down
    LinkSignal,
}

/// Event broadcaster for Dashboard
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<DashboardEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast(&self, event: DashboardEvent) {
        // Ignore error if no subscribers
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}
