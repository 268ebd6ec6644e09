//! Event fan-out to connected `WebSocket` clients.

use std::collections::HashMap;
use std::sync::Arc;

use flickmatch_core::ConnectionId;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::rpc::types::RpcEvent;

/// Tracks live connections and delivers events to them by id.
pub struct BroadcastManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Deliver `event` to each listed connection that is still live.
    ///
    /// Returns how many connections accepted it. Unknown ids and full
    /// queues are skipped.
    pub async fn send_to(&self, recipients: &[ConnectionId], event: &RpcEvent) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = event.event_type, error = %e, "failed to serialize event");
                return 0;
            }
        };
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for id in recipients {
            let Some(conn) = conns.get(id) else {
                debug!(conn_id = %id, event_type = event.event_type, "recipient no longer connected");
                continue;
            };
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                warn!(conn_id = %id, event_type = event.event_type, "failed to send event to client");
            }
        }
        debug!(
            event_type = event.event_type,
            session_id = event.session_id.as_deref(),
            recipients = recipients.len(),
            delivered,
            "event delivered"
        );
        delivered
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}
