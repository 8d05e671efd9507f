use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcasts serialized event frames to all SSE subscribers.
///
/// Frames are `{"event": <name>, "params": <object>}` strings. Lagging or
/// absent subscribers are never an error.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send an event frame to all subscribers.
    pub fn broadcast(&self, event: &str, params: Value) {
        let frame = serde_json::json!({
            "event": event,
            "params": params
        });
        // A send error only means nobody is listening right now.
        let _ = self
            .tx
            .send(serde_json::to_string(&frame).unwrap_or_default());
    }

    /// New receiver over the full event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
