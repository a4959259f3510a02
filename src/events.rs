//! Per-stream event subscriptions.
//!
//! Origin-side changes (a new quality becoming ready, a re-run transcode)
//! are published as stream events; signaling registration ensures a
//! subscriber exists for the stream so those events are at least
//! observed. Consumption is fire-and-forget and logged only.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// An event scoped to one movie stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    /// Event type, e.g. "quality.ready", "playlist.updated"
    #[serde(rename = "type")]
    pub event_type: String,
    /// The movie stream the event belongs to
    pub movie_id: String,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl StreamEvent {
    /// Create a stream event timestamped to now.
    pub fn now(event_type: impl Into<String>, movie_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            movie_id: movie_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Broadcast-based hub for stream events.
///
/// If a subscriber falls behind it receives `RecvError::Lagged`; events
/// are hints, so lag is logged and skipped over.
pub struct StreamEventHub {
    tx: broadcast::Sender<StreamEvent>,
    subscribed: Mutex<HashSet<String>>,
}

impl StreamEventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    /// Publish a stream event. Dropped silently when nobody listens.
    pub fn publish(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to the raw event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Ensure a logging subscriber task exists for a stream. At most one
    /// task is spawned per stream for the lifetime of the process.
    pub fn ensure_subscribed(&self, movie_id: &str) {
        {
            let mut subscribed = self.subscribed.lock().unwrap();
            if !subscribed.insert(movie_id.to_string()) {
                return;
            }
        }

        tracing::info!(movie_id = %movie_id, "Subscribed to stream events");
        let movie_id = movie_id.to_string();
        let mut rx = self.tx.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.movie_id == movie_id => {
                        tracing::debug!(
                            movie_id = %event.movie_id,
                            event_type = %event.event_type,
                            timestamp = %event.timestamp,
                            "Received stream event"
                        );
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(movie_id = %movie_id, skipped, "Stream event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Whether a subscriber task exists for a stream.
    pub fn is_subscribed(&self, movie_id: &str) -> bool {
        self.subscribed.lock().unwrap().contains(movie_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let hub = StreamEventHub::new(16);
        let mut rx = hub.subscribe();

        hub.publish(StreamEvent::now("quality.ready", "m1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "quality.ready");
        assert_eq!(event.movie_id, "m1");
    }

    #[tokio::test]
    async fn no_subscribers_does_not_panic() {
        let hub = StreamEventHub::new(16);
        hub.publish(StreamEvent::now("playlist.updated", "m1"));
    }

    #[tokio::test]
    async fn ensure_subscribed_is_idempotent() {
        let hub = StreamEventHub::new(16);
        assert!(!hub.is_subscribed("m1"));
        hub.ensure_subscribed("m1");
        hub.ensure_subscribed("m1");
        assert!(hub.is_subscribed("m1"));
        assert!(!hub.is_subscribed("m2"));
    }

    #[test]
    fn event_serializes_type_field() {
        let event = StreamEvent {
            event_type: "quality.ready".into(),
            movie_id: "m1".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"quality.ready""#));
        assert!(!json.contains("event_type"));
    }
}
