use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use modelgen_core::types::{OwnerId, Timestamp};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Owner group membership, set once the connection authenticates.
    pub owner_id: Option<OwnerId>,
    /// Generation groups this connection subscribed to.
    pub generations: HashSet<Uuid>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Connection registration: every live socket with its owner group and
/// generation groups.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        owner_id: Option<OwnerId>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            owner_id,
            generations: HashSet::new(),
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection and all its group memberships.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Place a connection in `owner_id`'s group. Returns `false` for an
    /// unknown connection.
    pub async fn authenticate(&self, conn_id: &str, owner_id: OwnerId) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.owner_id = Some(owner_id);
                true
            }
            None => false,
        }
    }

    pub async fn subscribe(&self, conn_id: &str, generation_id: Uuid) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.generations.insert(generation_id);
                true
            }
            None => false,
        }
    }

    /// Returns `true` when the connection was subscribed.
    pub async fn unsubscribe(&self, conn_id: &str, generation_id: Uuid) -> bool {
        self.connections
            .write()
            .await
            .get_mut(conn_id)
            .is_some_and(|conn| conn.generations.remove(&generation_id))
    }

    /// All connection IDs in an owner's group.
    pub async fn get_by_owner(&self, owner_id: OwnerId) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .filter_map(|(id, conn)| (conn.owner_id == Some(owner_id)).then(|| id.clone()))
            .collect()
    }

    /// Send to one connection. Returns `false` when it is gone.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    /// Send to every connection in an owner's group.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn send_to_owner(&self, owner_id: OwnerId, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.owner_id == Some(owner_id) {
                let _ = conn.sender.send(message.clone());
                count += 1;
            }
        }
        count
    }

    /// Deliver a generation event to the union of the owner group and the
    /// generation group. A connection in both receives it once.
    pub async fn deliver(&self, owner_id: OwnerId, generation_id: Uuid, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.owner_id == Some(owner_id) || conn.generations.contains(&generation_id) {
                let _ = conn.sender.send(message.clone());
                count += 1;
            }
        }
        count
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are skipped (they are
    /// cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
