//! Progress event envelope and the in-process bus that fans it out.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`; the WebSocket layer subscribes
//! to it and routes each event to the owner's connections.

use chrono::{DateTime, Utc};
use modelgen_core::types::OwnerId;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// A named update about one generation, addressed to its owner.
///
/// Built with [`ProgressEvent::new`] and the `with_*` builder methods.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// One of the `EVENT_*` names in `modelgen_core::progress_events`.
    pub event: String,
    pub owner_id: OwnerId,
    pub generation_id: Uuid,
    pub status: String,
    pub message: String,
    /// Absent for heartbeats, which never move progress.
    pub progress: Option<u8>,
    /// Extra fields merged into the wire `data` object.
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(event: impl Into<String>, owner_id: OwnerId, generation_id: Uuid) -> Self {
        Self {
            event: event.into(),
            owner_id,
            generation_id,
            status: String::new(),
            message: String::new(),
            progress: None,
            fields: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>, message: impl Into<String>) -> Self {
        self.status = status.into();
        self.message = message.into();
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Attach an extra `data` field. Reserved keys are not overwritten.
    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if !matches!(key, "generationId" | "status" | "message" | "progress" | "timestamp") {
            self.fields.insert(key.to_string(), value.into());
        }
        self
    }

    /// Same event with a fresh timestamp.
    pub fn restamped(&self) -> Self {
        Self {
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    /// `{ "event": <name>, "data": { generationId, status, message, ... } }`
    pub fn to_wire(&self) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        data.insert("generationId".into(), self.generation_id.to_string().into());
        data.insert("status".into(), self.status.clone().into());
        data.insert("message".into(), self.message.clone().into());
        if let Some(progress) = self.progress {
            data.insert("progress".into(), progress.into());
        }
        for (key, value) in &self.fields {
            data.insert(key.clone(), value.clone());
        }
        data.insert("timestamp".into(), self.timestamp.to_rfc3339().into());

        serde_json::json!({ "event": self.event, "data": data })
    }
}

// ---------------------------------------------------------------------------
// ProgressSink
// ---------------------------------------------------------------------------

/// Where the orchestrator sends progress events. Delivery is best-effort:
/// publishing never fails and never blocks.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn publish(&self, _event: ProgressEvent) {}
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus over a [`broadcast`] channel.
pub struct EventBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
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

impl ProgressSink for EventBus {
    fn publish(&self, event: ProgressEvent) {
        // A send error only means nobody is listening.
        let _ = self.sender.send(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use modelgen_core::progress_events::{EVENT_CONTINUE, STATUS_COMPOSITION};

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let id = Uuid::new_v4();

        bus.publish(ProgressEvent::new(EVENT_CONTINUE, 3, id).with_progress(20));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.generation_id, id);
        assert_eq!(e2.progress, Some(20));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(ProgressEvent::new(EVENT_CONTINUE, 1, Uuid::new_v4()));
    }

    #[test]
    fn wire_shape_nests_fields_under_data() {
        let id = Uuid::new_v4();
        let event = ProgressEvent::new(EVENT_CONTINUE, 9, id)
            .with_status(STATUS_COMPOSITION, "Composing images")
            .with_progress(20)
            .with_field("compositionUrl", "https://s/c.png");

        let wire = event.to_wire();
        assert_eq!(wire["event"], "continue");
        assert_eq!(wire["data"]["generationId"], id.to_string());
        assert_eq!(wire["data"]["status"], "composition");
        assert_eq!(wire["data"]["message"], "Composing images");
        assert_eq!(wire["data"]["progress"], 20);
        assert_eq!(wire["data"]["compositionUrl"], "https://s/c.png");
    }

    #[test]
    fn reserved_fields_cannot_be_overridden() {
        let event = ProgressEvent::new(EVENT_CONTINUE, 9, Uuid::new_v4())
            .with_status("processing", "Still working")
            .with_field("status", "hijacked");
        assert_eq!(event.to_wire()["data"]["status"], "processing");
        assert!(event.to_wire()["data"].get("progress").is_none());
    }
}
