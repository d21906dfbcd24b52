use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event key type
pub type EventKey = String;

/// Event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Empty,
    String(String),
    Map(HashMap<String, serde_json::Value>),
}

/// Pipeline event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Event key (e.g., "container.resolved", "image.pushed")
    pub key: EventKey,

    /// Event payload
    pub payload: EventPayload,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl PipelineEvent {
    /// Create a new event
    pub fn new(key: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            key: key.into(),
            payload,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create an event with no payload
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(key, EventPayload::Empty)
    }

    /// Create an event with a string payload
    pub fn with_string(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, EventPayload::String(message.into()))
    }

    /// Create an event with a map payload
    pub fn with_map(key: impl Into<String>, map: HashMap<String, serde_json::Value>) -> Self {
        Self::new(key, EventPayload::Map(map))
    }
}

/// Event emitter
///
/// Cloned into every pipeline stage. Emitting without subscribers is a no-op.
#[derive(Clone)]
pub struct EventEmitter {
    sender: Arc<broadcast::Sender<PipelineEvent>>,
}

impl EventEmitter {
    /// Create a new event emitter
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Emit an event
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Event catalog - predefined event keys
pub mod events {
    // Pipeline events
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    pub const PIPELINE_FAILED: &str = "pipeline.failed";

    // Stage events
    pub const CONTAINER_RESOLVED: &str = "container.resolved";
    pub const CHECKPOINT_CREATED: &str = "checkpoint.created";
    pub const IMAGE_COMMITTED: &str = "image.committed";
    pub const REGISTRY_AUTHENTICATED: &str = "registry.authenticated";
    pub const IMAGE_PUSHED: &str = "image.pushed";

    // Artifact events
    pub const ARTIFACT_REMOVED: &str = "artifact.removed";
    pub const ARTIFACT_CLEANUP_FAILED: &str = "artifact.cleanup_failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let emitter = EventEmitter::new(8);
        let mut rx = emitter.subscribe();

        emitter.emit(PipelineEvent::with_string(events::CONTAINER_RESOLVED, "ctr-1"));
        emitter.emit(PipelineEvent::empty(events::PIPELINE_COMPLETED));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.key, events::CONTAINER_RESOLVED);
        assert_eq!(first.payload, EventPayload::String("ctr-1".to_string()));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.key, events::PIPELINE_COMPLETED);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let emitter = EventEmitter::default();
        emitter.emit(PipelineEvent::empty(events::PIPELINE_STARTED));
    }

    #[test]
    fn test_map_payload_serialization() {
        let mut map = HashMap::new();
        map.insert("image".to_string(), serde_json::json!("repo:checkpoint-ctr-1"));
        let event = PipelineEvent::with_map(events::IMAGE_PUSHED, map);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"key\":\"image.pushed\""));
        assert!(json.contains("repo:checkpoint-ctr-1"));
    }
}
