//! `/health`: liveness plus the connection and pairing-session load.

use std::time::Instant;

use serde::Serialize;

/// Point-in-time load figures gathered by the HTTP handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadSnapshot {
    /// Open `WebSocket` connections registered for event delivery.
    pub connections: usize,
    /// Upgrades that can still be accepted before `/ws` answers 503.
    pub free_slots: usize,
    /// Live pairing sessions (waiting or active).
    pub sessions: usize,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the server accepts upgrades, `"full"` at the connection cap.
    pub status: &'static str,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// See [`LoadSnapshot::connections`].
    pub connections: usize,
    /// See [`LoadSnapshot::free_slots`].
    pub free_connection_slots: usize,
    /// See [`LoadSnapshot::sessions`].
    pub active_sessions: usize,
}

/// Build the `/health` body.
pub fn health_check(start_time: Instant, load: LoadSnapshot) -> HealthResponse {
    HealthResponse {
        status: if load.free_slots == 0 { "full" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: load.connections,
        free_connection_slots: load.free_slots,
        active_sessions: load.sessions,
    }
}
