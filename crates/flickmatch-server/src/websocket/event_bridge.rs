//! Event bridge: converts core `SessionEvent`s into `RpcEvent`s and routes
//! them to their recipients through the `BroadcastManager`.

use std::sync::Arc;

use flickmatch_core::SessionEvent;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::broadcast::BroadcastManager;
use crate::rpc::types::RpcEvent;

/// Bridges session events to `WebSocket` clients.
pub struct EventBridge {
    rx: broadcast::Receiver<SessionEvent>,
    broadcast: Arc<BroadcastManager>,
    token: CancellationToken,
}

impl EventBridge {
    /// Create a new event bridge.
    pub fn new(
        rx: broadcast::Receiver<SessionEvent>,
        broadcast: Arc<BroadcastManager>,
        token: CancellationToken,
    ) -> Self {
        Self {
            rx,
            broadcast,
            token,
        }
    }

    /// Run the bridge loop until the sender is dropped or the token fires.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self) {
        loop {
            let received = tokio::select! {
                () = self.token.cancelled() => break,
                received = self.rx.recv() => received,
            };
            match received {
                Ok(event) => {
                    tracing::debug!(
                        event_type = event.event_type(),
                        session_id = %event.session_id(),
                        "bridging event to clients"
                    );
                    let rpc_event = session_event_to_rpc(&event);
                    let _ = self.broadcast.send_to(event.recipients(), &rpc_event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("event bridge: sender closed, exiting");
                    break;
                }
            }
        }
    }
}

/// Convert a `SessionEvent` into its wire form.
pub fn session_event_to_rpc(event: &SessionEvent) -> RpcEvent {
    let data = match event {
        SessionEvent::Started { .. } => None,
        SessionEvent::Matched { item_id, .. } => Some(json!({ "itemId": item_id })),
        SessionEvent::Ended { reason, .. } => Some(json!({ "reason": reason.as_str() })),
    };
    RpcEvent::new(
        event.event_type(),
        Some(event.session_id().to_string()),
        data,
    )
}
