//! `WebSocket` connection lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use flickmatch_core::ConnectionId;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler::handle_message;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::rpc::context::RpcContext;
use crate::rpc::registry::MethodRegistry;
use crate::rpc::types::RpcEvent;

/// How long the writer gets to flush after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the `connection.established` greeting.
pub fn established_event(connection_id: &ConnectionId) -> RpcEvent {
    RpcEvent::new(
        "connection.established",
        None,
        Some(json!({ "clientId": connection_id })),
    )
}

/// Run one client connection.
///
/// 1. Sends `connection.established` with the client id
/// 2. Dispatches inbound text frames as RPC requests
/// 3. Forwards queued responses and events, pinging every heartbeat interval
/// 4. On close, pong timeout or shutdown, drops the client from its session
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    broadcast: Arc<BroadcastManager>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));
    let started = Instant::now();
    let token = shutdown.child_token();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    broadcast.add(Arc::clone(&connection)).await;

    if let Ok(json) = serde_json::to_string(&established_event(&connection_id)) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    let writer_conn = Arc::clone(&connection);
    let writer_token = token.clone();
    let ping_every = config.heartbeat_interval();
    let pong_timeout = config.heartbeat_timeout();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !writer_conn.check_alive() && writer_conn.last_pong_elapsed() > pong_timeout {
                        warn!(timeout = ?pong_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = writer_token.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        // Wake the reader if it is still waiting on the socket.
        writer_token.cancel();
    });

    loop {
        let frame = tokio::select! {
            () = token.cancelled() => break,
            frame = ws_rx.next() => frame,
        };
        let Some(Ok(msg)) = frame else { break };

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(s) => s.to_owned(),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
        };
        connection.mark_alive();

        let result = handle_message(&text, &registry, &ctx, &connection_id).await;
        if let Some(json) = result.response_json {
            if !connection.send(Arc::new(json)) {
                warn!(method = %result.method, "failed to enqueue response");
            }
        }
    }

    if let Some(session_id) = ctx.sessions.disconnect(&connection_id) {
        debug!(session_id = %session_id, "left session on disconnect");
    }
    broadcast.remove(&connection_id).await;

    token.cancel();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    info!(
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    // Full connection lifecycles are covered by tests/integration.rs.
    use super::*;

    #[test]
    fn established_event_shape() {
        let event = established_event(&ConnectionId::from("conn_1"));
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "connection.established");
        assert_eq!(v["data"]["clientId"], "conn_1");
        assert!(v["timestamp"].is_string());
        assert!(v.get("sessionId").is_none());
    }
}
