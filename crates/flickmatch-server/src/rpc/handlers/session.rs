//! Session handlers: create, join, swipe, leave, getState.

use async_trait::async_trait;
use flickmatch_core::{ConnectionId, ItemId, SessionError, SessionId, Vote};
use metrics::counter;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::metrics::{MATCHES_TOTAL, SESSION_JOIN_REJECTIONS_TOTAL, SESSIONS_CREATED_TOTAL, SWIPES_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{require_param, require_string_param};
use crate::rpc::registry::MethodHandler;

fn session_id_param(params: Option<&Value>) -> Result<SessionId, RpcError> {
    require_string_param(params, "sessionId").map(SessionId::from)
}

/// `itemId`, falling back to the legacy `movieId` key.
///
/// Any scalar is accepted; numbers and booleans use their JSON text, so
/// `550` and `"550"` name the same item.
fn item_id_param(params: Option<&Value>) -> Result<ItemId, RpcError> {
    let has_item = params.and_then(|p| p.get("itemId")).is_some();
    let key = if !has_item && params.and_then(|p| p.get("movieId")).is_some() {
        "movieId"
    } else {
        "itemId"
    };
    match require_param(params, key)? {
        Value::String(s) => Ok(ItemId::from(s.as_str())),
        v @ (Value::Number(_) | Value::Bool(_)) => Ok(ItemId::from(v.to_string())),
        _ => Err(RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a string or number"),
        }),
    }
}

fn direction_param(params: Option<&Value>) -> Result<Vote, RpcError> {
    let raw = require_param(params, "direction")?;
    serde_json::from_value(raw.clone()).map_err(|_| RpcError::InvalidParams {
        message: format!(
            "Parameter 'direction' must be one of accept, reject, right, left (got {raw})"
        ),
    })
}

/// Creates a session with the caller as its first participant.
pub struct CreateSessionHandler;

#[async_trait]
impl MethodHandler for CreateSessionHandler {
    #[instrument(skip_all, fields(method = "session.create", conn_id = %caller))]
    async fn handle(
        &self,
        _params: Option<Value>,
        ctx: &RpcContext,
        caller: &ConnectionId,
    ) -> Result<Value, RpcError> {
        let session_id = ctx.sessions.create_session(caller);
        counter!(SESSIONS_CREATED_TOTAL).increment(1);
        Ok(json!({ "sessionId": session_id }))
    }
}

/// Admits the caller as the second participant.
pub struct JoinSessionHandler;

#[async_trait]
impl MethodHandler for JoinSessionHandler {
    #[instrument(skip_all, fields(method = "session.join", conn_id = %caller))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &ConnectionId,
    ) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        match ctx.sessions.join_session(&session_id, caller) {
            Ok(_) => Ok(json!({ "sessionId": session_id })),
            Err(err) => {
                counter!(SESSION_JOIN_REJECTIONS_TOTAL, "reason" => err.code()).increment(1);
                Err(RpcError::join_failed(&err))
            }
        }
    }
}

/// Records a swipe and reports whether the item is now a match.
pub struct SwipeHandler;

#[async_trait]
impl MethodHandler for SwipeHandler {
    #[instrument(skip_all, fields(method = "session.swipe", conn_id = %caller))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &ConnectionId,
    ) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        let item_id = item_id_param(params.as_ref())?;
        let vote = direction_param(params.as_ref())?;

        let outcome = ctx
            .sessions
            .record_swipe(&session_id, caller, &item_id, vote)?;
        counter!(SWIPES_TOTAL, "direction" => vote.as_str()).increment(1);
        if outcome.announced {
            counter!(MATCHES_TOTAL).increment(1);
        }
        if outcome.previous.is_some() {
            debug!(item_id = %item_id, "vote replaced");
        }
        Ok(json!({ "recorded": true, "matched": outcome.matched }))
    }
}

/// Removes the caller from a session while keeping the connection open.
pub struct LeaveSessionHandler;

#[async_trait]
impl MethodHandler for LeaveSessionHandler {
    #[instrument(skip_all, fields(method = "session.leave", conn_id = %caller))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &ConnectionId,
    ) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        ctx.sessions.leave_session(&session_id, caller)?;
        Ok(json!({ "left": true }))
    }
}

/// Returns a snapshot of a session the caller participates in.
pub struct GetStateHandler;

#[async_trait]
impl MethodHandler for GetStateHandler {
    #[instrument(skip_all, fields(method = "session.getState", conn_id = %caller))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &ConnectionId,
    ) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        let snapshot = ctx
            .sessions
            .snapshot(&session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        if !snapshot.participants.contains(caller) {
            return Err(SessionError::NotParticipant {
                session_id,
                connection_id: caller.clone(),
            }
            .into());
        }
        serde_json::to_value(snapshot).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::errors::{
        ALREADY_JOINED, INVALID_PARAMS, JOIN_FAILED_MESSAGE, NOT_PARTICIPANT, SESSION_FULL,
        SESSION_NOT_FOUND,
    };
    use crate::rpc::handlers::test_helpers::make_test_context;
    use flickmatch_core::SessionEvent;

    fn conn(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    async fn create(ctx: &RpcContext, caller: &ConnectionId) -> String {
        let result = CreateSessionHandler
            .handle(None, ctx, caller)
            .await
            .unwrap();
        result["sessionId"].as_str().unwrap().to_owned()
    }

    async fn join(ctx: &RpcContext, sid: &str, caller: &ConnectionId) -> Result<Value, RpcError> {
        JoinSessionHandler
            .handle(Some(json!({"sessionId": sid})), ctx, caller)
            .await
    }

    async fn swipe(
        ctx: &RpcContext,
        sid: &str,
        caller: &ConnectionId,
        item: &str,
        direction: &str,
    ) -> Result<Value, RpcError> {
        SwipeHandler
            .handle(
                Some(json!({"sessionId": sid, "itemId": item, "direction": direction})),
                ctx,
                caller,
            )
            .await
    }

    #[tokio::test]
    async fn create_returns_session_id() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        assert_eq!(sid.len(), 9);
        assert_eq!(ctx.sessions.session_count(), 1);
    }

    #[tokio::test]
    async fn join_success_emits_started() {
        let ctx = make_test_context();
        let mut rx = ctx.sessions.subscribe();
        let sid = create(&ctx, &conn("c1")).await;

        let result = join(&ctx, &sid, &conn("c2")).await.unwrap();
        assert_eq!(result["sessionId"], sid.as_str());
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, SessionEvent::Started { .. }));
        assert_eq!(event.recipients(), &[conn("c1"), conn("c2")]);
    }

    #[tokio::test]
    async fn join_full_session_fails() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let _ = join(&ctx, &sid, &conn("c2")).await.unwrap();

        let err = join(&ctx, &sid, &conn("c3")).await.unwrap_err();
        assert_eq!(err.code(), SESSION_FULL);
        assert_eq!(err.to_string(), JOIN_FAILED_MESSAGE);
        let snapshot = ctx.sessions.snapshot(&SessionId::from(sid.as_str())).unwrap();
        assert_eq!(snapshot.participants, vec![conn("c1"), conn("c2")]);
    }

    #[tokio::test]
    async fn join_unknown_session_fails() {
        let ctx = make_test_context();
        let err = join(&ctx, "nosuchsid", &conn("c1")).await.unwrap_err();
        assert_eq!(err.code(), SESSION_NOT_FOUND);
        assert_eq!(err.to_string(), JOIN_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn join_own_session_fails() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let err = join(&ctx, &sid, &conn("c1")).await.unwrap_err();
        assert_eq!(err.code(), ALREADY_JOINED);
    }

    #[tokio::test]
    async fn join_requires_session_id() {
        let ctx = make_test_context();
        let err = JoinSessionHandler
            .handle(Some(json!({})), &ctx, &conn("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[tokio::test]
    async fn mutual_accept_matches() {
        let ctx = make_test_context();
        let mut rx = ctx.sessions.subscribe();
        let sid = create(&ctx, &conn("c1")).await;
        let _ = join(&ctx, &sid, &conn("c2")).await.unwrap();
        let _ = rx.try_recv().unwrap();

        let first = swipe(&ctx, &sid, &conn("c1"), "m1", "accept").await.unwrap();
        assert_eq!(first, json!({"recorded": true, "matched": false}));
        let second = swipe(&ctx, &sid, &conn("c2"), "m1", "right").await.unwrap();
        assert_eq!(second, json!({"recorded": true, "matched": true}));

        match rx.try_recv().unwrap() {
            SessionEvent::Matched { item_id, .. } => assert_eq!(item_id.as_str(), "m1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reject_does_not_match() {
        let ctx = make_test_context();
        let mut rx = ctx.sessions.subscribe();
        let sid = create(&ctx, &conn("c1")).await;
        let _ = join(&ctx, &sid, &conn("c2")).await.unwrap();
        let _ = rx.try_recv().unwrap();

        let _ = swipe(&ctx, &sid, &conn("c1"), "m1", "accept").await.unwrap();
        let result = swipe(&ctx, &sid, &conn("c2"), "m1", "left").await.unwrap();
        assert_eq!(result["matched"], false);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn swipe_accepts_movie_id_alias() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let result = SwipeHandler
            .handle(
                Some(json!({"sessionId": sid, "movieId": "m7", "direction": "right"})),
                &ctx,
                &conn("c1"),
            )
            .await
            .unwrap();
        assert_eq!(result["recorded"], true);
    }

    #[tokio::test]
    async fn numeric_movie_id_matches_string_item_id() {
        let ctx = make_test_context();
        let mut rx = ctx.sessions.subscribe();
        let sid = create(&ctx, &conn("c1")).await;
        let _ = join(&ctx, &sid, &conn("c2")).await.unwrap();

        let first = SwipeHandler
            .handle(
                Some(json!({"sessionId": sid, "movieId": 550, "direction": "right"})),
                &ctx,
                &conn("c1"),
            )
            .await
            .unwrap();
        assert_eq!(first["recorded"], true);
        assert_eq!(first["matched"], false);

        let second = swipe(&ctx, &sid, &conn("c2"), "550", "accept").await.unwrap();
        assert_eq!(second["matched"], true);

        let matched = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|e| matches!(e, SessionEvent::Matched { .. }));
        assert!(matches!(
            matched,
            Some(SessionEvent::Matched { ref item_id, .. }) if item_id.as_str() == "550"
        ));
    }

    #[tokio::test]
    async fn structured_item_id_is_rejected() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let err = SwipeHandler
            .handle(
                Some(json!({"sessionId": sid, "itemId": {"id": 1}, "direction": "accept"})),
                &ctx,
                &conn("c1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[tokio::test]
    async fn swipe_rejects_bad_direction() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let err = swipe(&ctx, &sid, &conn("c1"), "m1", "up").await.unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[tokio::test]
    async fn swipe_requires_item() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let err = SwipeHandler
            .handle(
                Some(json!({"sessionId": sid, "direction": "accept"})),
                &ctx,
                &conn("c1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: itemId");
    }

    #[tokio::test]
    async fn swipe_unknown_session_fails() {
        let ctx = make_test_context();
        let err = swipe(&ctx, "nosuchsid", &conn("c1"), "m1", "accept")
            .await
            .unwrap_err();
        assert_eq!(err.code(), SESSION_NOT_FOUND);
    }

    #[tokio::test]
    async fn swipe_by_stranger_fails() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let err = swipe(&ctx, &sid, &conn("c9"), "m1", "accept").await.unwrap_err();
        assert_eq!(err.code(), NOT_PARTICIPANT);
    }

    #[tokio::test]
    async fn leave_then_state_is_gone() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let result = LeaveSessionHandler
            .handle(Some(json!({"sessionId": sid})), &ctx, &conn("c1"))
            .await
            .unwrap();
        assert_eq!(result["left"], true);

        let err = GetStateHandler
            .handle(Some(json!({"sessionId": sid})), &ctx, &conn("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), SESSION_NOT_FOUND);
    }

    #[tokio::test]
    async fn get_state_returns_snapshot() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let _ = join(&ctx, &sid, &conn("c2")).await.unwrap();
        let _ = swipe(&ctx, &sid, &conn("c1"), "m1", "accept").await.unwrap();
        let _ = swipe(&ctx, &sid, &conn("c2"), "m1", "accept").await.unwrap();

        let state = GetStateHandler
            .handle(Some(json!({"sessionId": sid})), &ctx, &conn("c2"))
            .await
            .unwrap();
        assert_eq!(state["sessionId"], sid.as_str());
        assert_eq!(state["state"], "active");
        assert_eq!(state["participants"], json!(["c1", "c2"]));
        assert_eq!(state["matchedItems"], json!(["m1"]));
        assert_eq!(state["voteCount"], 2);
    }

    #[tokio::test]
    async fn get_state_hidden_from_strangers() {
        let ctx = make_test_context();
        let sid = create(&ctx, &conn("c1")).await;
        let err = GetStateHandler
            .handle(Some(json!({"sessionId": sid})), &ctx, &conn("c9"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), NOT_PARTICIPANT);
    }
}
