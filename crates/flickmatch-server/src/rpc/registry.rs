//! Method registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flickmatch_core::ConnectionId;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::warn;

use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::errors::{self, RpcError};
use crate::rpc::types::{RpcRequest, RpcResponse};

/// Trait implemented by every RPC method handler.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler on behalf of `caller`.
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &ConnectionId,
    ) -> Result<Value, RpcError>;
}

/// Registry mapping method names to handlers.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a method name.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.handlers.insert(method.to_owned(), Arc::new(handler));
    }

    /// Maximum time a single RPC handler is allowed to run.
    const HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

    /// Dispatch a request to the appropriate handler.
    ///
    /// Notifications get a response too (with an empty id); the caller
    /// decides whether to deliver it.
    pub async fn dispatch(
        &self,
        request: RpcRequest,
        ctx: &RpcContext,
        caller: &ConnectionId,
    ) -> RpcResponse {
        let method = request.method;
        let id = request.id.unwrap_or_default();
        counter!(RPC_REQUESTS_TOTAL, "method" => method.clone()).increment(1);

        let Some(handler) = self.handlers.get(&method) else {
            counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => "method_not_found").increment(1);
            return RpcResponse::error(
                id,
                errors::METHOD_NOT_FOUND,
                format!("Method '{method}' not found"),
            );
        };

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(
            Self::HANDLER_TIMEOUT,
            handler.handle(request.params, ctx, caller),
        )
        .await;

        let response = match result {
            Ok(Ok(result)) => RpcResponse::success(id, result),
            Ok(Err(err)) => {
                counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => err.code().to_owned()).increment(1);
                RpcResponse::failure(id, err.to_error_body())
            }
            Err(_elapsed) => {
                counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => "timeout").increment(1);
                tracing::error!(method, "RPC handler timed out after {:?}", Self::HANDLER_TIMEOUT);
                RpcResponse::error(
                    id,
                    errors::INTERNAL_ERROR,
                    format!("Handler for '{method}' timed out"),
                )
            }
        };

        let duration = start.elapsed();
        histogram!(RPC_REQUEST_DURATION_SECONDS, "method" => method.clone())
            .record(duration.as_secs_f64());

        if duration >= Duration::from_secs(1) {
            warn!(
                method,
                duration_secs = duration.as_secs_f64(),
                "slow RPC request"
            );
        }

        response
    }

    /// List all registered method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::test_helpers::{make_test_context, test_caller};
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl MethodHandler for EchoHandler {
        async fn handle(
            &self,
            params: Option<Value>,
            _ctx: &RpcContext,
            _caller: &ConnectionId,
        ) -> Result<Value, RpcError> {
            Ok(params.unwrap_or(json!(null)))
        }
    }

    struct WhoAmIHandler;

    #[async_trait]
    impl MethodHandler for WhoAmIHandler {
        async fn handle(
            &self,
            _params: Option<Value>,
            _ctx: &RpcContext,
            caller: &ConnectionId,
        ) -> Result<Value, RpcError> {
            Ok(json!(caller.as_str()))
        }
    }

    struct FailHandler;

    #[async_trait]
    impl MethodHandler for FailHandler {
        async fn handle(
            &self,
            _params: Option<Value>,
            _ctx: &RpcContext,
            _caller: &ConnectionId,
        ) -> Result<Value, RpcError> {
            Err(RpcError::Internal {
                message: "boom".into(),
            })
        }
    }

    fn request(id: Option<&str>, method: &str, params: Option<Value>) -> RpcRequest {
        RpcRequest {
            id: id.map(ToOwned::to_owned),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn dispatch_success() {
        let mut reg = MethodRegistry::new();
        reg.register("echo", EchoHandler);
        let ctx = make_test_context();

        let resp = reg
            .dispatch(request(Some("r1"), "echo", Some(json!({"a": 1}))), &ctx, &test_caller())
            .await;
        assert!(resp.success);
        assert_eq!(resp.id, "r1");
        assert_eq!(resp.result.unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn dispatch_passes_caller() {
        let mut reg = MethodRegistry::new();
        reg.register("whoami", WhoAmIHandler);
        let ctx = make_test_context();
        let caller = ConnectionId::from("conn_x");

        let resp = reg.dispatch(request(Some("r1"), "whoami", None), &ctx, &caller).await;
        assert_eq!(resp.result.unwrap(), "conn_x");
    }

    #[tokio::test]
    async fn dispatch_error() {
        let mut reg = MethodRegistry::new();
        reg.register("fail", FailHandler);
        let ctx = make_test_context();

        let resp = reg.dispatch(request(Some("r2"), "fail", None), &ctx, &test_caller()).await;
        assert!(!resp.success);
        let err = resp.error.unwrap();
        assert_eq!(err.code, errors::INTERNAL_ERROR);
        assert_eq!(err.message, "boom");
    }

    #[tokio::test]
    async fn dispatch_method_not_found() {
        let reg = MethodRegistry::new();
        let ctx = make_test_context();

        let resp = reg.dispatch(request(Some("r3"), "nope", None), &ctx, &test_caller()).await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, errors::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn dispatch_notification_has_empty_id() {
        let mut reg = MethodRegistry::new();
        reg.register("echo", EchoHandler);
        let ctx = make_test_context();

        let resp = reg.dispatch(request(None, "echo", None), &ctx, &test_caller()).await;
        assert!(resp.success);
        assert!(resp.id.is_empty());
    }

    #[test]
    fn methods_sorted() {
        let mut reg = MethodRegistry::new();
        reg.register("z.last", EchoHandler);
        reg.register("a.first", EchoHandler);
        assert_eq!(reg.methods(), vec!["a.first", "z.last"]);
        assert!(reg.has_method("a.first"));
        assert!(!reg.has_method("b.middle"));
    }
}
