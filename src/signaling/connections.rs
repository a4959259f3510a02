//! Node-local table of live signaling connections.
//!
//! Maps a peer id to the outbound channel of its WebSocket task. RTC
//! relay only succeeds when both peers are connected to this process
//! instance; cross-node fan-out is an open scaling question, not handled
//! here.

use axum::extract::ws::Message;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ConnectionTable {
    connections: RwLock<HashMap<String, UnboundedSender<Message>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer's outbound channel. A reconnect under the same id
    /// replaces the previous entry (latest connection wins).
    pub async fn register(&self, peer_id: &str, sender: UnboundedSender<Message>) {
        self.connections
            .write()
            .await
            .insert(peer_id.to_string(), sender);
    }

    /// Remove a peer's entry; keeps the table consistent even when called
    /// twice on the same teardown path.
    pub async fn unregister(&self, peer_id: &str) {
        self.connections.write().await.remove(peer_id);
    }

    /// Remove a peer's entry only if it still belongs to the given sender.
    /// A reconnect under the same id must not be evicted by the old
    /// connection's teardown.
    pub async fn unregister_sender(&self, peer_id: &str, sender: &UnboundedSender<Message>) {
        let mut connections = self.connections.write().await;
        if let Some(current) = connections.get(peer_id) {
            if current.same_channel(sender) {
                connections.remove(peer_id);
            }
        }
    }

    /// Deliver a message to a connected peer. Returns false when the peer
    /// is unknown or its connection has already gone away.
    pub async fn send_to(&self, peer_id: &str, message: Message) -> bool {
        let connections = self.connections.read().await;
        match connections.get(peer_id) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Number of live connections on this node.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn delivers_to_registered_peer() {
        let table = ConnectionTable::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        table.register("p1", tx).await;

        assert!(table.send_to("p1", Message::Text("hi".into())).await);
        assert!(matches!(rx.recv().await, Some(Message::Text(t)) if t == "hi"));
        assert!(!table.send_to("p2", Message::Text("hi".into())).await);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let table = ConnectionTable::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        table.register("p1", tx).await;
        table.unregister("p1").await;
        table.unregister("p1").await;
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn latest_connection_wins() {
        let table = ConnectionTable::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        table.register("p1", tx1).await;
        table.register("p1", tx2).await;

        assert!(table.send_to("p1", Message::Text("hi".into())).await);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }
}
