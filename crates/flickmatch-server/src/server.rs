//! `FlickmatchServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use flickmatch_core::ConnectionId;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::expiry::spawn_idle_sweeper;
use crate::health::{self, HealthResponse, LoadSnapshot};
use crate::rpc::context::RpcContext;
use crate::rpc::registry::MethodRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::event_bridge::EventBridge;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live connections, for event fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// One permit per `WebSocket` connection, reserved before the upgrade.
    pub connection_slots: Arc<Semaphore>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// Handler context.
    pub ctx: Arc<RpcContext>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Renders `/metrics`.
    pub metrics_handle: PrometheusHandle,
}

/// The Flickmatch server.
pub struct FlickmatchServer {
    state: AppState,
}

impl FlickmatchServer {
    /// Create a new server.
    pub fn new(
        config: ServerConfig,
        registry: MethodRegistry,
        ctx: Arc<RpcContext>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let slots = config.max_connections.min(Semaphore::MAX_PERMITS);
        Self {
            state: AppState {
                broadcast: Arc::new(BroadcastManager::new()),
                connection_slots: Arc::new(Semaphore::new(slots)),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                registry: Arc::new(registry),
                ctx,
                config: Arc::new(config),
                metrics_handle,
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind, then serve in the background along with the event bridge and,
    /// when enabled, the idle sweeper.
    ///
    /// Every spawned task is tracked by the shutdown coordinator. Returns
    /// the bound address.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let shutdown = &self.state.shutdown;

        let bridge = EventBridge::new(
            self.state.ctx.sessions.subscribe(),
            Arc::clone(&self.state.broadcast),
            shutdown.token(),
        );
        shutdown.track("event_bridge", tokio::spawn(bridge.run()));

        if let Some(idle) = self.state.config.idle_timeout() {
            let sweeper = spawn_idle_sweeper(
                Arc::clone(&self.state.ctx.sessions),
                idle,
                self.state.config.sweep_interval(),
                shutdown.token(),
            );
            shutdown.track("idle_sweeper", sweeper);
        }

        let router = self.router();
        let token = shutdown.token();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });
        shutdown.track("http_server", server);

        info!(%addr, "flickmatch server listening");
        Ok(addr)
    }

    /// Live connection registry.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.state.broadcast
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.state.registry
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let load = LoadSnapshot {
        connections: state.broadcast.connection_count().await,
        free_slots: state.connection_slots.available_permits(),
        sessions: state.ctx.sessions.session_count(),
    };
    Json(health::health_check(state.start_time, load))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics_handle.render(),
    )
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Some(permit) = reserve_slot(&state.connection_slots) else {
        warn!(
            max = state.config.max_connections,
            "connection limit reached, rejecting upgrade"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    };

    // The permit lives as long as the connection; a failed upgrade drops it.
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(
                socket,
                ConnectionId::generate(),
                state.registry,
                state.ctx,
                state.broadcast,
                state.config,
                state.shutdown.token(),
            )
            .await;
            drop(permit);
        })
}

/// Take a connection slot without waiting.
fn reserve_slot(slots: &Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
    Arc::clone(slots).try_acquire_owned().ok()
}
