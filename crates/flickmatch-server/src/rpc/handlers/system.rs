//! System handlers: ping, getInfo.

use async_trait::async_trait;
use flickmatch_core::ConnectionId;
use serde_json::Value;
use tracing::instrument;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;

/// Returns a pong with the current server timestamp.
pub struct PingHandler;

#[async_trait]
impl MethodHandler for PingHandler {
    #[instrument(skip_all, fields(method = "system.ping"))]
    async fn handle(
        &self,
        _params: Option<Value>,
        _ctx: &RpcContext,
        _caller: &ConnectionId,
    ) -> Result<Value, RpcError> {
        Ok(serde_json::json!({
            "pong": true,
            "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }))
    }
}

/// Returns server version, uptime and platform information.
pub struct GetInfoHandler;

#[async_trait]
impl MethodHandler for GetInfoHandler {
    #[instrument(skip_all, fields(method = "system.getInfo"))]
    async fn handle(
        &self,
        _params: Option<Value>,
        ctx: &RpcContext,
        _caller: &ConnectionId,
    ) -> Result<Value, RpcError> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime": ctx.server_start_time.elapsed().as_secs(),
            "activeSessions": ctx.sessions.session_count(),
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }))
    }
}
