//! Inbound message dispatch: parse text as an `RpcRequest` and route it
//! through the `MethodRegistry`.

use flickmatch_core::ConnectionId;
use tracing::{debug, instrument, warn};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::INVALID_PARAMS;
use crate::rpc::registry::MethodRegistry;
use crate::rpc::types::{RpcRequest, RpcResponse};

/// Result of handling one inbound message.
pub struct HandleResult {
    /// Serialized response to send back, `None` for notifications.
    pub response_json: Option<String>,
    /// The method that was called (empty if parsing failed).
    pub method: String,
    /// Typed response, also produced for notifications.
    pub response: RpcResponse,
}

fn serialize(response: &RpcResponse) -> Option<String> {
    serde_json::to_string(response)
        .inspect_err(|e| tracing::error!(error = %e, "failed to serialize response"))
        .ok()
}

/// Handle an inbound text message from `caller`.
#[instrument(skip_all, fields(method, conn_id = %caller))]
pub async fn handle_message(
    message: &str,
    registry: &MethodRegistry,
    ctx: &RpcContext,
    caller: &ConnectionId,
) -> HandleResult {
    let request: RpcRequest = match serde_json::from_str(message) {
        Ok(r) => r,
        Err(e) => {
            warn!("invalid JSON received");
            let response = RpcResponse::error("unknown", INVALID_PARAMS, format!("Invalid JSON: {e}"));
            return HandleResult {
                response_json: serialize(&response),
                method: String::new(),
                response,
            };
        }
    };

    let method = request.method.clone();
    let notification = request.is_notification();
    let _ = tracing::Span::current().record("method", method.as_str());
    debug!(method, id = request.id.as_deref(), notification, "dispatching RPC");

    if !registry.has_method(&method) {
        warn!(method, "unknown RPC method");
    }
    let response = registry.dispatch(request, ctx, caller).await;

    let response_json = if notification {
        if let Some(err) = &response.error {
            debug!(method, code = %err.code, "notification failed, not answered");
        }
        None
    } else {
        serialize(&response)
    };

    HandleResult {
        response_json,
        method,
        response,
    }
}
