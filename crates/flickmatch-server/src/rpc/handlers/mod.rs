//! RPC handler modules and registration.

pub mod session;
pub mod system;

use serde_json::Value;

use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodRegistry;

/// Register all RPC handlers with the registry.
pub fn register_all(registry: &mut MethodRegistry) {
    // System
    registry.register("system.ping", system::PingHandler);
    registry.register("system.getInfo", system::GetInfoHandler);

    // Session
    registry.register("session.create", session::CreateSessionHandler);
    registry.register("session.join", session::JoinSessionHandler);
    registry.register("session.swipe", session::SwipeHandler);
    registry.register("session.leave", session::LeaveSessionHandler);
    registry.register("session.getState", session::GetStateHandler);
}

/// Extract a required parameter from the params object.
pub(crate) fn require_param<'a>(
    params: Option<&'a Value>,
    key: &str,
) -> Result<&'a Value, RpcError> {
    params
        .and_then(|p| p.get(key))
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Missing required parameter: {key}"),
        })
}

/// Extract a required string parameter.
pub(crate) fn require_string_param(params: Option<&Value>, key: &str) -> Result<String, RpcError> {
    require_param(params, key)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a string"),
        })
}
