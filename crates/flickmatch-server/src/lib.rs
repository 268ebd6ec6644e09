//! # flickmatch-server
//!
//! Axum HTTP + `WebSocket` transport for Flickmatch pairing sessions.
//!
//! - HTTP endpoints: `/health`, `/metrics` (Prometheus text)
//! - `WebSocket` gateway at `/ws`: connection management, heartbeat, RPC dispatch
//! - Session events from `flickmatch-core` fanned out to their recipients
//! - Idle-session sweeper and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod expiry;
pub mod health;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;
